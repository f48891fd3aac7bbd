use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{
    future::{self, BoxFuture, Shared},
    FutureExt,
};

use crate::{BootError, SiteboxError, SiteboxResult};

use super::Sandbox;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The outcome every boot waiter receives.
pub type BootOutcome = Result<Arc<dyn Sandbox>, BootError>;

/// A cloneable handle to a sandbox that is booting, booted, or failed to boot.
///
/// All clones observe the same single boot. Awaiting it never starts a second one.
#[derive(Clone)]
pub struct SandboxBoot {
    outcome: Shared<BoxFuture<'static, BootOutcome>>,
    loaded: Arc<AtomicBool>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxBoot {
    /// Starts booting a sandbox in the background.
    ///
    /// The boot runs on its own task, so it makes progress even before anyone awaits it.
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, F>(boot: F) -> Self
    where
        S: Sandbox,
        F: Future<Output = SiteboxResult<S>> + Send + 'static,
    {
        let loaded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&loaded);

        let handle = tokio::spawn(async move {
            tracing::info!("booting sandbox");
            match boot.await {
                Ok(sandbox) => {
                    flag.store(true, Ordering::Release);
                    tracing::info!("sandbox booted");
                    Ok(Arc::new(sandbox) as Arc<dyn Sandbox>)
                }
                Err(e) => {
                    tracing::error!("failed to boot sandbox: {}", e);
                    Err(BootError::new(e))
                }
            }
        });

        let outcome = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(BootError::new(e)),
            }
        }
        .boxed()
        .shared();

        Self { outcome, loaded }
    }

    /// A boot that has already succeeded with `sandbox`.
    pub fn ready(sandbox: impl Sandbox) -> Self {
        let sandbox: Arc<dyn Sandbox> = Arc::new(sandbox);
        Self {
            outcome: future::ready(Ok(sandbox)).boxed().shared(),
            loaded: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A boot that has already failed with `error`.
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            outcome: future::ready(Err(BootError::new(error))).boxed().shared(),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A boot that never finishes, as when no sandbox can run in the current environment.
    pub fn pending() -> Self {
        Self {
            outcome: future::pending::<BootOutcome>().boxed().shared(),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` once the sandbox has finished booting successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Waits for the boot to finish.
    pub async fn wait(&self) -> BootOutcome {
        self.outcome.clone().await
    }

    /// Waits for the boot to finish, giving up after `timeout` if one is set.
    ///
    /// ## Errors
    ///
    /// * [`SiteboxError::BootFailed`] if the boot was rejected
    /// * [`SiteboxError::BootTimeout`] if it did not finish in time
    pub async fn wait_timeout(&self, timeout: Option<Duration>) -> SiteboxResult<Arc<dyn Sandbox>> {
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait())
                .await
                .map_err(|_| SiteboxError::BootTimeout(limit))?,
            None => self.wait().await,
        };

        Ok(outcome?)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for SandboxBoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxBoot")
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

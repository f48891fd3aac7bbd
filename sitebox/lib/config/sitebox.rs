use std::{env, time::Duration};

use getset::Getters;
use typed_builder::TypedBuilder;

use crate::{SiteboxError, SiteboxResult};

use super::{
    Credentials, API_BASE_URL_ENV_VAR, API_TOKEN_ENV_VAR, BOOT_TIMEOUT_ENV_VAR,
    DEFAULT_API_BASE_URL, DEFAULT_BOOT_TIMEOUT, DEFAULT_PROJECT_ID, DEFAULT_WORKDIR_NAME,
    PROJECT_ID_ENV_VAR, SESSION_COOKIE_ENV_VAR, WORKDIR_NAME_ENV_VAR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings shared by the registration client, the coordinator and the saver.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct SiteboxConfig {
    /// Base URL of the backend, without a trailing slash.
    #[builder(default = DEFAULT_API_BASE_URL.to_string(), setter(into))]
    api_base_url: String,

    /// Credentials attached to every backend request.
    #[builder(default)]
    credentials: Credentials,

    /// Name of the sandbox root directory, recorded in runtime metadata.
    #[builder(default = DEFAULT_WORKDIR_NAME.to_string(), setter(into))]
    workdir_name: String,

    /// Project id used when the caller does not pass one.
    #[builder(default = DEFAULT_PROJECT_ID.to_string(), setter(into))]
    default_project_id: String,

    /// Upper bound on how long registration waits for the sandbox to boot. `None` waits forever.
    #[builder(default = Some(DEFAULT_BOOT_TIMEOUT))]
    boot_timeout: Option<Duration>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SiteboxConfig {
    /// Loads the configuration from the process environment.
    ///
    /// A `.env` file in the working directory (or any parent) is loaded first if present.
    /// A bearer token takes precedence over a session cookie when both are set.
    pub fn from_env() -> SiteboxResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }

        let api_base_url = env::var(API_BASE_URL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let credentials = match (env::var(API_TOKEN_ENV_VAR), env::var(SESSION_COOKIE_ENV_VAR)) {
            (Ok(token), _) if !token.is_empty() => Credentials::Bearer(token),
            (_, Ok(cookie)) if !cookie.is_empty() => Credentials::Cookie(cookie),
            _ => Credentials::Anonymous,
        };

        let workdir_name =
            env::var(WORKDIR_NAME_ENV_VAR).unwrap_or_else(|_| DEFAULT_WORKDIR_NAME.to_string());

        let default_project_id =
            env::var(PROJECT_ID_ENV_VAR).unwrap_or_else(|_| DEFAULT_PROJECT_ID.to_string());

        let boot_timeout = match env::var(BOOT_TIMEOUT_ENV_VAR) {
            Ok(raw) => parse_boot_timeout(&raw)?,
            Err(_) => Some(DEFAULT_BOOT_TIMEOUT),
        };

        Ok(Self {
            api_base_url,
            credentials,
            workdir_name,
            default_project_id,
            boot_timeout,
        })
    }

    /// Returns `project_id` if given, otherwise the configured default.
    pub fn resolve_project_id(&self, project_id: Option<&str>) -> String {
        match project_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.default_project_id.clone(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parses a boot timeout given in whole seconds. `0` means no timeout.
fn parse_boot_timeout(raw: &str) -> SiteboxResult<Option<Duration>> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        SiteboxError::InvalidConfig(format!("{BOOT_TIMEOUT_ENV_VAR} must be a number: {raw}"))
    })?;

    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for SiteboxConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for var in [
            API_BASE_URL_ENV_VAR,
            API_TOKEN_ENV_VAR,
            SESSION_COOKIE_ENV_VAR,
            WORKDIR_NAME_ENV_VAR,
            PROJECT_ID_ENV_VAR,
            BOOT_TIMEOUT_ENV_VAR,
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = SiteboxConfig::default();
        assert_eq!(config.get_api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.get_workdir_name(), DEFAULT_WORKDIR_NAME);
        assert_eq!(config.get_default_project_id(), DEFAULT_PROJECT_ID);
        assert_eq!(config.get_boot_timeout(), &Some(DEFAULT_BOOT_TIMEOUT));
        assert_eq!(config.get_credentials(), &Credentials::Anonymous);
    }

    #[test]
    fn test_config_resolve_project_id() {
        let config = SiteboxConfig::builder().default_project_id("fallback").build();
        assert_eq!(config.resolve_project_id(Some("p1")), "p1");
        assert_eq!(config.resolve_project_id(Some("")), "fallback");
        assert_eq!(config.resolve_project_id(None), "fallback");
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var(API_BASE_URL_ENV_VAR, "https://api.example.com/v1/");
        env::set_var(API_TOKEN_ENV_VAR, "tok");
        env::set_var(SESSION_COOKIE_ENV_VAR, "sid=1");
        env::set_var(WORKDIR_NAME_ENV_VAR, "app");
        env::set_var(BOOT_TIMEOUT_ENV_VAR, "0");

        let config = SiteboxConfig::from_env().unwrap();
        assert_eq!(config.get_api_base_url(), "https://api.example.com/v1");
        assert_eq!(config.get_credentials(), &Credentials::Bearer("tok".to_string()));
        assert_eq!(config.get_workdir_name(), "app");
        assert_eq!(config.get_boot_timeout(), &None);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_env_rejects_bad_timeout() {
        clear_env();
        env::set_var(BOOT_TIMEOUT_ENV_VAR, "soon");

        let err = SiteboxConfig::from_env().unwrap_err();
        assert!(matches!(err, SiteboxError::InvalidConfig(_)));

        clear_env();
    }

    #[test]
    fn test_parse_boot_timeout() {
        assert_eq!(parse_boot_timeout("15").unwrap(), Some(Duration::from_secs(15)));
        assert_eq!(parse_boot_timeout(" 5 ").unwrap(), Some(Duration::from_secs(5)));
        assert_eq!(parse_boot_timeout("0").unwrap(), None);
        assert!(parse_boot_timeout("-1").is_err());
    }
}

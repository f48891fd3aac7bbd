use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default base URL of the runtime registration backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// The default name of the sandbox root directory.
pub const DEFAULT_WORKDIR_NAME: &str = "project";

/// The project id used when neither the caller nor the environment names one.
pub const DEFAULT_PROJECT_ID: &str = "default";

/// How long to wait for the sandbox to boot before giving up on registration.
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// The description attached to every runtime record created by sitebox.
pub const DEFAULT_RUNTIME_DESCRIPTION: &str = "Generated web container for project development";

/// Prefix of the display name given to new runtime records.
pub const RUNTIME_NAME_PREFIX: &str = "WebContainer";

/// Environment variable holding the backend base URL.
pub const API_BASE_URL_ENV_VAR: &str = "SITEBOX_API_BASE_URL";

/// Environment variable holding a bearer token for the backend.
pub const API_TOKEN_ENV_VAR: &str = "SITEBOX_API_TOKEN";

/// Environment variable holding a session cookie for the backend.
pub const SESSION_COOKIE_ENV_VAR: &str = "SITEBOX_SESSION_COOKIE";

/// Environment variable holding the sandbox workdir name.
pub const WORKDIR_NAME_ENV_VAR: &str = "SITEBOX_WORKDIR_NAME";

/// Environment variable holding the fallback project id.
pub const PROJECT_ID_ENV_VAR: &str = "SITEBOX_PROJECT_ID";

/// Environment variable holding the boot timeout in seconds. `0` disables the timeout.
pub const BOOT_TIMEOUT_ENV_VAR: &str = "SITEBOX_BOOT_TIMEOUT_SECS";

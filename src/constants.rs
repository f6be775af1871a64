//! Service identity shared by the OpenAPI document, the services index and the CLI.

pub const API_TITLE: &str = "rollgate";
pub const API_VERSION: &str = "v1";
pub const API_DESCRIPTION: &str =
    "Token-protected service shell whose logs rotate weekly into verified zip archives.";

pub const API_CONTACT_NAME: &str = "rollgate maintainers";
pub const API_CONTACT_URL: &str = "https://github.com/rollgate/rollgate";

/// Header carrying the pre-shared key
pub const TOKEN_HEADER: &str = "x-token";

/// Name of the logger that receives bridged `tracing` events
pub const SERVICE_LOGGER: &str = "rollgate";

/// `/v1/services`
pub fn services_prefix() -> String {
    format!("/{}/services", API_VERSION)
}

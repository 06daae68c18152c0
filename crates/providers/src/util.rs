//! Shared utility functions for provider adapters.

use review_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from the environment variable named in config.
///
/// The key itself is never read from config or stored anywhere but the
/// process environment.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    std::env::var(env_var).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{env_var}' not set or not valid UTF-8"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_from_env() {
        let var_name = "REVIEW_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let result = resolve_api_key(var_name).unwrap();
        assert_eq!(result, "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_var_errors() {
        let err = resolve_api_key("REVIEW_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(err.to_string().contains("REVIEW_TEST_NONEXISTENT_VAR_8888"));
    }
}

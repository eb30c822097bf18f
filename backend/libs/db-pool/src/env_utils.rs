//! Environment variable parsing helpers
//!
//! Missing variables fall back to defaults; present but malformed variables are
//! reported as errors so a typo never silently becomes a default.

use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when unset or blank
///
/// # Example
/// ```ignore
/// let port: u16 = parse_env_or("APP_PORT", 8080)?;
/// ```
pub fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    Ok(parse_env_optional(key)?.unwrap_or(default))
}

/// Parse an optional environment variable (`Ok(None)` when unset or blank)
pub fn parse_env_optional<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid value for {key}: {raw:?}")),
        _ => Ok(None),
    }
}

/// Read a required, non-blank environment variable
pub fn require_env(key: &str) -> Result<String, String> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
        _ => Err(format!("environment variable {key} not set")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_parse_env_or() {
        std::env::remove_var("DB_POOL_TEST_PORT");
        assert_eq!(parse_env_or("DB_POOL_TEST_PORT", 42u16), Ok(42));

        std::env::set_var("DB_POOL_TEST_PORT", "8080");
        assert_eq!(parse_env_or("DB_POOL_TEST_PORT", 3000u16), Ok(8080));

        std::env::set_var("DB_POOL_TEST_PORT", "eighty");
        assert!(parse_env_or("DB_POOL_TEST_PORT", 3000u16).is_err());
        std::env::remove_var("DB_POOL_TEST_PORT");
    }

    #[test]
    #[serial_test::serial]
    fn test_blank_values_count_as_unset() {
        std::env::set_var("DB_POOL_TEST_BLANK", "   ");
        assert_eq!(parse_env_optional::<u32>("DB_POOL_TEST_BLANK"), Ok(None));
        assert!(require_env("DB_POOL_TEST_BLANK").is_err());
        std::env::remove_var("DB_POOL_TEST_BLANK");
    }

    #[test]
    #[serial_test::serial]
    fn test_require_env_trims() {
        std::env::set_var("DB_POOL_TEST_REQ", " postgres://db/app ");
        assert_eq!(
            require_env("DB_POOL_TEST_REQ"),
            Ok("postgres://db/app".to_string())
        );
        std::env::remove_var("DB_POOL_TEST_REQ");
    }
}

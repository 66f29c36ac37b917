//! `${VAR}` and `${VAR:-default}` expansion for configuration strings.

use crate::ConfigError;

/// Expand environment variable references in `value`.
///
/// `${VAR}` fails when VAR is unset; `${VAR:-default}` falls back to the
/// default. Bare `$VAR` is left alone.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.var_name),
    })
}

struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_simple_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUIRE_EXPAND_SIMPLE", "hello");
        }
        assert_eq!(
            expand_env("${QUIRE_EXPAND_SIMPLE}", "test.field").unwrap(),
            "hello"
        );
        unsafe {
            std::env::remove_var("QUIRE_EXPAND_SIMPLE");
        }
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUIRE_EXPAND_UNSET");
        }
        assert_eq!(
            expand_env("${QUIRE_EXPAND_UNSET:-main}", "repository.branch").unwrap(),
            "main"
        );
    }

    #[test]
    fn test_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUIRE_EXPAND_MISSING");
        }
        let err = expand_env("token ${QUIRE_EXPAND_MISSING}", "repository.token").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let msg = err.to_string();
        assert!(msg.contains("QUIRE_EXPAND_MISSING"));
        assert!(msg.contains("repository.token"));
    }

    #[test]
    fn test_embedded_and_multiple_vars() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUIRE_EXPAND_OWNER", "acme");
            std::env::set_var("QUIRE_EXPAND_REPO", "blog");
        }
        assert_eq!(
            expand_env("${QUIRE_EXPAND_OWNER}/${QUIRE_EXPAND_REPO}", "repository.repo").unwrap(),
            "acme/blog"
        );
        unsafe {
            std::env::remove_var("QUIRE_EXPAND_OWNER");
            std::env::remove_var("QUIRE_EXPAND_REPO");
        }
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        assert_eq!(expand_env("$HOME/x", "f").unwrap(), "$HOME/x");
        assert_eq!(expand_env("literal", "f").unwrap(), "literal");
    }
}

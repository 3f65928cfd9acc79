use serde::{Deserialize, Serialize};

use std::fmt;

/// A named pointer into the secret store (e.g. `{ secret: SENTRY_AUTH_TOKEN }`).
///
/// Only the name lives in a definition; the value is looked up when a run
/// starts and never written back.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    pub secret: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            secret: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretRef(\"{}\")", self.secret)
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.secret)
    }
}

/// Secret names are ASCII letters, digits, `_`, `-` and `.`.
pub fn is_valid_secret_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Placeholder written in place of a secret value.
pub const REDACTED: &str = "***";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_ref_yaml_shape() {
        let r: SecretRef = serde_yaml_ng::from_str("secret: DEPLOY_KEY").unwrap();
        assert_eq!(r.name(), "DEPLOY_KEY");
    }

    #[test]
    fn test_secret_ref_rejects_extra_fields() {
        let r = serde_yaml_ng::from_str::<SecretRef>("secret: A\nother: B");
        assert!(r.is_err());
    }

    #[test]
    fn test_secret_name_validation() {
        assert!(is_valid_secret_name("SENTRY_AUTH_TOKEN"));
        assert!(is_valid_secret_name("deploy.key-1"));
        assert!(!is_valid_secret_name(""));
        assert!(!is_valid_secret_name("has space"));
        assert!(!is_valid_secret_name("a/b"));
    }
}

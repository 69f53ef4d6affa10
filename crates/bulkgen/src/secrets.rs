//! Provider credential resolution.
//!
//! An API key may be given three ways, checked in this order:
//!
//! 1. `apiKey` - inline value, for local experiments
//! 2. `apiKeyFile` - path to a file holding the key (container secrets)
//! 3. `apiKeyEnvVar` - name of an environment variable holding the key

use std::fs;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key source configured (set apiKey, apiKeyFile or apiKeyEnvVar)")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// File contents and environment values are trimmed, so a trailing newline
/// in a mounted secret does not end up in an `Authorization` header.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but `Ok(None)` when nothing is configured.
///
/// Local OpenAI-compatible servers often run without a key.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the current user's home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_inline_key_wins() {
        std::env::set_var("BULKGEN_TEST_KEY_A", "from-env");
        let secret =
            resolve_secret(Some("inline"), None, Some("BULKGEN_TEST_KEY_A")).unwrap();
        assert_eq!(secret.expose_secret(), "inline");
        std::env::remove_var("BULKGEN_TEST_KEY_A");
    }

    #[test]
    #[serial]
    fn test_file_beats_env_and_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  sk-file-key  ").unwrap();
        std::env::set_var("BULKGEN_TEST_KEY_B", "from-env");

        let path = file.path().to_str().unwrap();
        let secret = resolve_secret(None, Some(path), Some("BULKGEN_TEST_KEY_B")).unwrap();
        assert_eq!(secret.expose_secret(), "sk-file-key");
        std::env::remove_var("BULKGEN_TEST_KEY_B");
    }

    #[test]
    #[serial]
    fn test_env_fallback() {
        std::env::set_var("BULKGEN_TEST_KEY_C", "sk-env\n");
        let secret = resolve_secret(Some(""), Some(""), Some("BULKGEN_TEST_KEY_C")).unwrap();
        assert_eq!(secret.expose_secret(), "sk-env");
        std::env::remove_var("BULKGEN_TEST_KEY_C");
    }

    #[test]
    fn test_missing_sources() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(None, Some("/definitely/not/here"), None),
            Err(SecretError::FileReadError { .. })
        ));
        assert!(matches!(
            resolve_secret(None, None, Some("BULKGEN_TEST_KEY_UNSET_XYZ")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_empty_key_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = resolve_secret(None, file.path().to_str(), None).unwrap_err();
        assert!(matches!(err, SecretError::EmptyFile { .. }));
    }

    #[test]
    fn test_optional_resolution() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
        assert!(resolve_secret_optional(Some("k"), None, None).unwrap().is_some());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/key"), "/abs/key");
        if let Some(home) = dirs::home_dir() {
            let expected = format!("{}/keys/openai", home.to_string_lossy());
            assert_eq!(expand_home("~/keys/openai"), expected);
        }
    }
}

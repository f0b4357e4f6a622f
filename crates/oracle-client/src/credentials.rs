use std::env;
use std::io::ErrorKind;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::OracleError;

/// Credential sets as stored in the `api_keys.json` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialFile {
    #[serde(default)]
    pub gemini: Vec<String>,
    #[serde(default)]
    pub modelscope: Vec<String>,
}

impl CredentialFile {
    /// Reads the credential file. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let mut parsed: CredentialFile = serde_json::from_slice(&bytes).map_err(|err| {
                    OracleError::config(format!(
                        "failed to parse credential file {}: {err}",
                        path.display()
                    ))
                })?;
                parsed.gemini = clean(parsed.gemini);
                parsed.modelscope = clean(parsed.modelscope);
                debug!(
                    target: "oracle",
                    path = %path.display(),
                    gemini = parsed.gemini.len(),
                    modelscope = parsed.modelscope.len(),
                    "loaded oracle credentials"
                );
                Ok(parsed)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    target: "oracle",
                    path = %path.display(),
                    "credential file not found; relying on environment"
                );
                Ok(Self::default())
            }
            Err(err) => Err(OracleError::config(format!(
                "failed to read credential file {}: {err}",
                path.display()
            ))),
        }
    }

    /// `GEMINI_API_KEYS` and `MODELSCOPE_API_KEY` (comma separated) replace
    /// the file contents when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(keys) = env_list("GEMINI_API_KEYS") {
            self.gemini = keys;
        }
        if let Some(keys) = env_list("MODELSCOPE_API_KEY") {
            self.modelscope = keys;
        }
        self
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let keys = clean(raw.split(',').map(str::to_string).collect());
    (!keys.is_empty()).then_some(keys)
}

fn clean(keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}

/// Cyclic credential pool shared by every caller of one client.
#[derive(Debug, Default)]
pub struct CredentialPool {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: clean(keys),
            cursor: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the next credential with its slot index, wrapping around.
    pub fn next(&self) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let mut cursor = self.cursor.lock();
        let index = *cursor % self.keys.len();
        *cursor = (index + 1) % self.keys.len();
        Some((index, self.keys[index].as_str()))
    }
}

/// Last six characters of a key, for logs.
pub(crate) fn key_hint(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pool_cycles_through_keys() {
        let pool = CredentialPool::new(vec!["a".into(), " ".into(), "b".into()]);
        assert_eq!(pool.len(), 2);
        let picks: Vec<_> = (0..5).filter_map(|_| pool.next()).map(|(i, _)| i).collect();
        assert_eq!(picks, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn empty_pool_yields_nothing() {
        let pool = CredentialPool::new(Vec::new());
        assert!(pool.next().is_none());
    }

    #[test]
    fn loads_file_and_discards_blank_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"gemini": ["g1", "", "g2"], "modelscope": ["m1"]}}"#
        )
        .expect("write keys");
        let loaded = CredentialFile::load(file.path()).expect("load");
        assert_eq!(loaded.gemini, vec!["g1", "g2"]);
        assert_eq!(loaded.modelscope, vec!["m1"]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let loaded = CredentialFile::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(loaded, CredentialFile::default());
    }

    #[test]
    fn key_hint_keeps_tail() {
        assert_eq!(key_hint("abcdefghij"), "...efghij");
        assert_eq!(key_hint("xy"), "...xy");
    }
}

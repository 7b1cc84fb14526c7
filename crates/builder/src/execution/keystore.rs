//! Keystore properties for the signer

use apkpipe_errors::{BuildError, Error};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const STORE_PASSWORD: &str = "key.store.password";
const ALIAS: &str = "key.alias";
const ALIAS_PASSWORD: &str = "key.alias.password";

/// Everything the signer needs to sign one package.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub keystore: PathBuf,
    pub store_password: String,
    pub alias: String,
    pub alias_password: String,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl SigningCredentials {
    /// Read the properties file next to a keystore.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a required key is
    /// missing.
    pub async fn load(keystore: &Path, properties: &Path) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(properties)
            .await
            .map_err(|e| Error::io_with_path(&e, properties))?;
        Self::from_properties(keystore, &text)
    }

    /// # Errors
    ///
    /// Returns an error if a required key is missing.
    pub fn from_properties(keystore: &Path, text: &str) -> Result<Self, Error> {
        let mut values = parse_properties(text);
        let mut take = |key: &str| {
            values.remove(key).ok_or_else(|| {
                Error::from(BuildError::KeystoreProperties {
                    message: format!("missing {key}"),
                })
            })
        };
        Ok(Self {
            keystore: keystore.to_path_buf(),
            store_password: take(STORE_PASSWORD)?,
            alias: take(ALIAS)?,
            alias_password: take(ALIAS_PASSWORD)?,
        })
    }
}

/// Minimal Java properties reader: `key=value` or `key: value`, `#` and
/// `!` comments, surrounding whitespace ignored.
fn parse_properties(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

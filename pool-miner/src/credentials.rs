//! Miner credentials and the pool owner address.
//!
//! The credential file is JSON:
//!
//! ```json
//! {
//!   "owner_address": "<pool fee address>",
//!   "credentials": [
//!     {"login": "alice", "pass": "secret", "address": "<payout address>"}
//!   ]
//! }
//! ```
//!
//! A reload parses and validates the whole file before swapping it in, so a
//! bad file never replaces a good set.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::tracing::prelude::*;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed credential file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate login {0:?}")]
    DuplicateLogin(String),

    #[error("empty login")]
    EmptyLogin,

    #[error("pool owner address missing")]
    MissingOwner,

    #[error("no credential file configured")]
    NoSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub login: String,
    pub pass: String,
    pub address: String,
}

#[derive(Deserialize)]
struct CredentialFile {
    owner_address: String,
    #[serde(default)]
    credentials: Vec<Credential>,
}

/// A validated credential set.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    owner_address: String,
    by_login: HashMap<String, Credential>,
}

impl CredentialSet {
    pub fn new(
        owner_address: impl Into<String>,
        credentials: Vec<Credential>,
    ) -> Result<Self, CredentialError> {
        let owner_address = owner_address.into();
        if owner_address.is_empty() {
            return Err(CredentialError::MissingOwner);
        }

        let mut by_login = HashMap::with_capacity(credentials.len());
        for cred in credentials {
            if cred.login.is_empty() {
                return Err(CredentialError::EmptyLogin);
            }
            if by_login.contains_key(&cred.login) {
                return Err(CredentialError::DuplicateLogin(cred.login));
            }
            by_login.insert(cred.login.clone(), cred);
        }

        Ok(Self {
            owner_address,
            by_login,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CredentialError> {
        let file: CredentialFile = serde_json::from_slice(bytes)?;
        Self::new(file.owner_address, file.credentials)
    }

    pub fn owner_address(&self) -> &str {
        &self.owner_address
    }

    pub fn get(&self, login: &str) -> Option<&Credential> {
        self.by_login.get(login)
    }

    pub fn len(&self) -> usize {
        self.by_login.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_login.is_empty()
    }
}

pub struct CredentialStore {
    current: Mutex<Arc<CredentialSet>>,
    source: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(set: CredentialSet) -> Self {
        Self {
            current: Mutex::new(Arc::new(set)),
            source: None,
        }
    }

    /// Load from `path`, remembering it for later [`reload`](Self::reload)s.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let set = read_set(&path)?;
        info!(path = %path.display(), logins = set.len(), "Credentials loaded");
        Ok(Self {
            current: Mutex::new(Arc::new(set)),
            source: Some(path),
        })
    }

    /// Re-read the configured file. Returns the number of logins loaded.
    pub fn reload(&self) -> Result<usize, CredentialError> {
        let path = self.source.as_deref().ok_or(CredentialError::NoSource)?;
        self.reload_from(path)
    }

    /// Load `path` and swap it in; on failure the current set stays.
    pub fn reload_from(&self, path: &Path) -> Result<usize, CredentialError> {
        let set = read_set(path).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "Credential reload failed, keeping previous set");
        })?;
        let logins = set.len();
        self.replace(set);
        info!(path = %path.display(), logins, "Credentials reloaded");
        Ok(logins)
    }

    pub fn replace(&self, set: CredentialSet) {
        *self.current.lock() = Arc::new(set);
    }

    /// The set in effect right now.
    pub fn snapshot(&self) -> Arc<CredentialSet> {
        Arc::clone(&self.current.lock())
    }

    pub fn authenticate(&self, login: &str, pass: &str) -> bool {
        self.snapshot()
            .get(login)
            .is_some_and(|cred| cred.pass == pass)
    }

    pub fn owner_address(&self) -> String {
        self.snapshot().owner_address().to_string()
    }

    pub fn address_of(&self, login: &str) -> Option<String> {
        self.snapshot().get(login).map(|c| c.address.clone())
    }
}

fn read_set(path: &Path) -> Result<CredentialSet, CredentialError> {
    let bytes = std::fs::read(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CredentialSet::parse(&bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub(crate) fn cred(login: &str, pass: &str, address: &str) -> Credential {
        Credential {
            login: login.into(),
            pass: pass.into(),
            address: address.into(),
        }
    }

    /// Unique scratch file under the system temp dir.
    pub(crate) fn temp_file(contents: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "pool-miner-creds-{}-{}.json",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_and_authenticate() {
        let store = CredentialStore::new(
            CredentialSet::parse(
                br#"{"owner_address":"OWNER","credentials":[
                    {"login":"alice","pass":"a","address":"ADDR-A"},
                    {"login":"bob","pass":"b","address":"ADDR-B"}]}"#,
            )
            .unwrap(),
        );

        assert!(store.authenticate("alice", "a"));
        assert!(!store.authenticate("alice", "b"));
        assert!(!store.authenticate("carol", ""));
        assert_eq!(store.owner_address(), "OWNER");
        assert_eq!(store.address_of("bob").as_deref(), Some("ADDR-B"));
    }

    #[test]
    fn test_duplicate_login_rejected() {
        let err = CredentialSet::new("OWNER", vec![cred("alice", "1", "x"), cred("alice", "2", "y")])
            .unwrap_err();
        assert!(matches!(err, CredentialError::DuplicateLogin(login) if login == "alice"));
    }

    #[test]
    fn test_missing_owner_rejected() {
        assert!(matches!(
            CredentialSet::new("", vec![]),
            Err(CredentialError::MissingOwner)
        ));
    }

    #[test]
    fn test_failed_reload_keeps_previous_set() {
        let path = temp_file(
            r#"{"owner_address":"OWNER","credentials":[{"login":"alice","pass":"a","address":"A"}]}"#,
        );
        let store = CredentialStore::load(&path).unwrap();

        std::fs::write(
            &path,
            r#"{"owner_address":"NEW","credentials":[
                {"login":"bob","pass":"b","address":"B"},
                {"login":"bob","pass":"c","address":"C"}]}"#,
        )
        .unwrap();
        assert!(store.reload().is_err());
        assert!(store.authenticate("alice", "a"));
        assert_eq!(store.owner_address(), "OWNER");

        std::fs::write(
            &path,
            r#"{"owner_address":"NEW","credentials":[{"login":"bob","pass":"b","address":"B"}]}"#,
        )
        .unwrap();
        assert_eq!(store.reload().unwrap(), 1);
        assert!(!store.authenticate("alice", "a"));
        assert!(store.authenticate("bob", "b"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_reload_without_source() {
        let store = CredentialStore::new(CredentialSet::default());
        assert!(matches!(store.reload(), Err(CredentialError::NoSource)));
    }

    #[test]
    fn test_concurrent_logins_see_whole_sets() {
        // Old set: alice/old + bob/old. New set: alice/new + bob/new.
        let old = || CredentialSet::new("OWNER", vec![cred("alice", "old", "A"), cred("bob", "old", "B")]).unwrap();
        let new = || CredentialSet::new("OWNER", vec![cred("alice", "new", "A"), cred("bob", "new", "B")]).unwrap();
        let store = Arc::new(CredentialStore::new(old()));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let set = store.snapshot();
                        let alice = &set.get("alice").unwrap().pass;
                        let bob = &set.get("bob").unwrap().pass;
                        assert_eq!(alice, bob, "observed a mixed credential set");
                    }
                })
            })
            .collect();

        for i in 0..200 {
            store.replace(if i % 2 == 0 { new() } else { old() });
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}

//! Session ownership and token persistence.
//!
//! # Design
//! - `SessionStore` is the only writer of the persisted token slot.
//! - The authenticated flag is derived from token presence on every read.
//! - Persistence is best-effort: storage failures are logged and the in-memory
//!   state still follows the caller's intent.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

/// Well-known key holding the bearer token.
pub const TOKEN_STORAGE_KEY: &str = "access_token";

/// Authentication state derived from an optional token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    /// Build a session; blank tokens count as absent.
    #[must_use]
    pub fn from_token(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }

    /// Bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether a token is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Failures raised by a [`TokenStore`].
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Filesystem access failed.
    #[error("token storage I/O failed")]
    Io(#[from] io::Error),
    /// Stored document was not valid JSON.
    #[error("token storage is corrupt")]
    Format(#[from] serde_json::Error),
}

/// Single persisted slot for the bearer token.
pub trait TokenStore: Send + Sync {
    /// Read the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError`] when the slot cannot be read.
    fn load(&self) -> Result<Option<String>, TokenStoreError>;

    /// Replace the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError`] when the slot cannot be written.
    fn store(&self, token: &str) -> Result<(), TokenStoreError>;

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError`] when the slot cannot be cleared.
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// JSON file holding `{"access_token": "..."}`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by `path`; the file is created on first login.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, TokenStoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.read_document()?.remove(TOKEN_STORAGE_KEY))
    }

    fn store(&self, token: &str) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let document = BTreeMap::from([(TOKEN_STORAGE_KEY.to_string(), token.to_string())]);
        fs::write(&self.path, serde_json::to_vec_pretty(&document)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// In-process slot, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Slot pre-populated with `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    /// Current slot contents.
    #[must_use]
    pub fn peek(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.peek())
    }

    fn store(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Owner of the session token and its change notifications.
pub struct SessionStore {
    storage: Box<dyn TokenStore>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    /// Read the persisted token and derive the initial session. No network call.
    #[must_use]
    pub fn initialize(storage: Box<dyn TokenStore>) -> Self {
        let token = storage.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read persisted session token");
            None
        });
        let session = Session::from_token(token);
        tracing::debug!(
            authenticated = session.is_authenticated(),
            "session initialised"
        );
        let (state, _) = watch::channel(session);
        Self { storage, state }
    }

    /// Persist `token` and mark the session authenticated.
    pub fn login(&self, token: impl Into<String>) {
        let session = Session::from_token(Some(token.into()));
        match session.token() {
            Some(token) => {
                if let Err(err) = self.storage.store(token) {
                    tracing::warn!(error = %err, "failed to persist session token");
                }
            }
            None => {
                tracing::warn!("ignoring blank session token");
                self.logout();
                return;
            }
        }
        self.state.send_replace(session);
        tracing::info!("session started");
    }

    /// Clear the persisted token and mark the session unauthenticated.
    pub fn logout(&self) {
        if let Err(err) = self.storage.clear() {
            tracing::warn!(error = %err, "failed to clear persisted session token");
        }
        self.state.send_replace(Session::default());
        tracing::info!("session ended");
    }

    /// Whether a token is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every login and logout.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct SharedMemory(Arc<MemoryTokenStore>);

    impl TokenStore for SharedMemory {
        fn load(&self) -> Result<Option<String>, TokenStoreError> {
            self.0.load()
        }
        fn store(&self, token: &str) -> Result<(), TokenStoreError> {
            self.0.store(token)
        }
        fn clear(&self) -> Result<(), TokenStoreError> {
            self.0.clear()
        }
    }

    #[test]
    fn authenticated_flag_tracks_token_presence() {
        assert!(!Session::from_token(None).is_authenticated());
        assert!(!Session::from_token(Some("   ".into())).is_authenticated());
        let session = Session::from_token(Some(" abc ".into()));
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("abc"));
    }

    #[test]
    fn initialize_reads_persisted_token() {
        let store = SessionStore::initialize(Box::new(MemoryTokenStore::with_token("tok")));
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok"));

        let empty = SessionStore::initialize(Box::new(MemoryTokenStore::default()));
        assert!(!empty.is_authenticated());
    }

    #[test]
    fn login_and_logout_write_the_slot() {
        let slot = Arc::new(MemoryTokenStore::default());
        let store = SessionStore::initialize(Box::new(SharedMemory(Arc::clone(&slot))));
        let mut changes = store.subscribe();

        store.login("first");
        store.login("second");
        assert_eq!(slot.peek().as_deref(), Some("second"));
        assert!(changes.has_changed().unwrap_or(false));
        assert!(changes.borrow_and_update().is_authenticated());

        store.logout();
        assert_eq!(slot.peek(), None);
        assert!(!store.is_authenticated());
        assert!(!changes.borrow_and_update().is_authenticated());
    }

    #[test]
    fn blank_login_behaves_as_logout() {
        let store = SessionStore::initialize(Box::new(MemoryTokenStore::with_token("tok")));
        store.login("  ");
        assert!(!store.is_authenticated());
    }

    #[test]
    fn file_store_round_trips_under_the_well_known_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");
        let store = FileTokenStore::new(&path);
        assert_eq!(store.load().expect("load missing"), None);

        store.store("abc").expect("store");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains(TOKEN_STORAGE_KEY));
        assert_eq!(store.load().expect("load").as_deref(), Some("abc"));

        store.clear().expect("clear");
        assert!(!path.exists());
        store.clear().expect("clear twice");
    }

    #[test]
    fn corrupt_file_is_treated_as_logged_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json").expect("write");
        let session = SessionStore::initialize(Box::new(FileTokenStore::new(&path)));
        assert!(!session.is_authenticated());
    }
}

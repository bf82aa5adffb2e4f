//! Session and favorites store.
//!
//! [`SessionStore`] owns the authenticated session and its favorites set. It
//! keeps three copies in step: the in-memory snapshot read by the view layer,
//! the local key/value cache, and the remote favorites store (the source of
//! truth).
//!
//! Every change publishes a new `Arc<Session>`; readers never see a session
//! being edited. A session *epoch* is bumped on each login/logout so results
//! of remote calls issued for an older session are dropped instead of
//! overwriting the current one.

mod reconcile;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::favorites::FavoritesSet;
use crate::remote::FavoritesRemote;
use crate::session::{decode_claims, Session, TokenError};
use crate::storage::{KeyValueStore, StorageError, FAVORITES_KEY, TOKEN_KEY};

/// Errors reported by session lifecycle operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

/// Shared handle to the current session (or none when logged out)
pub type SessionSnapshot = Option<Arc<Session>>;

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    remote: Arc<dyn FavoritesRemote>,
    current: ArcSwapOption<Session>,
    /// Guards the epoch and serializes commits to `current` + storage
    commit: Mutex<u64>,
    /// One favorites round-trip (refresh/add/remove) at a time
    writer: tokio::sync::Mutex<()>,
    notify: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, remote: Arc<dyn FavoritesRemote>) -> Self {
        let (notify, _) = watch::channel(None);
        Self {
            storage,
            remote,
            current: ArcSwapOption::empty(),
            commit: Mutex::new(0),
            writer: tokio::sync::Mutex::new(()),
            notify,
        }
    }

    /// Restore the session persisted by a previous run, then refresh its
    /// favorites from the remote store.
    ///
    /// Never fails: an unreadable or undecodable token means "logged out" and
    /// the persisted credential and favorites cache are purged.
    pub async fn initialize(&self) -> SessionSnapshot {
        if self.restore().is_some() {
            self.refresh_from_remote().await;
        }
        self.current_session()
    }

    /// Install a session for `token` with an empty favorites set, persist the
    /// token, then refresh favorites from the remote store.
    ///
    /// On failure the previous session (if any) is left untouched.
    pub async fn login(&self, token: &str) -> Result<Arc<Session>, SessionError> {
        let token = token.trim();
        let claims = match decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Rejected login token");
                return Err(e.into());
            }
        };

        let session = {
            let mut epoch = self.commit.lock();
            self.storage.set(TOKEN_KEY, token)?;
            *epoch += 1;
            let session = Arc::new(Session::from_claims(
                claims,
                token.to_string(),
                FavoritesSet::new(),
            ));
            self.persist_favorites(&session.favorites);
            self.publish(Some(session.clone()));
            session
        };

        info!(user_id = %session.user_id, role = %session.role, "Logged in");
        self.refresh_from_remote().await;

        Ok(self.current_session().unwrap_or(session))
    }

    /// Drop the session and purge the persisted token and favorites cache.
    /// Safe to call when already logged out.
    pub fn logout(&self) {
        let mut epoch = self.commit.lock();
        *epoch += 1;
        self.purge_persisted();

        if let Some(previous) = self.current.load_full() {
            info!(user_id = %previous.user_id, "Logged out");
            self.publish(None);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn current_session(&self) -> SessionSnapshot {
        self.current.load_full()
    }

    /// Receive every published session snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.notify.subscribe()
    }

    /// Synchronous half of `initialize`: decode the persisted token and seed
    /// favorites from the local cache, without contacting the remote store.
    pub fn restore(&self) -> SessionSnapshot {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        };

        let mut epoch = self.commit.lock();
        *epoch += 1;

        let Some(token) = token else {
            debug!("No persisted session");
            self.publish(None);
            return None;
        };

        match decode_claims(&token) {
            Ok(claims) => {
                let favorites = self.read_cached_favorites();
                let session = Arc::new(Session::from_claims(claims, token, favorites));
                self.persist_favorites(&session.favorites);
                info!(
                    user_id = %session.user_id,
                    cached_favorites = session.favorites.len(),
                    "Restored session"
                );
                self.publish(Some(session.clone()));
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "Persisted token is invalid, clearing session");
                self.purge_persisted();
                self.publish(None);
                None
            }
        }
    }

    fn read_cached_favorites(&self) -> FavoritesSet {
        let raw = match self.storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return FavoritesSet::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read favorites cache");
                return FavoritesSet::new();
            }
        };

        FavoritesSet::from_json(&raw).unwrap_or_else(|| {
            warn!("Favorites cache is not a JSON array, ignoring it");
            FavoritesSet::new()
        })
    }

    /// Mirror `favorites` to the local cache. Best effort.
    fn persist_favorites(&self, favorites: &FavoritesSet) {
        if let Err(e) = self.storage.set(FAVORITES_KEY, &favorites.to_json()) {
            warn!(error = %e, "Failed to write favorites cache");
        }
    }

    fn purge_persisted(&self) {
        for key in [TOKEN_KEY, FAVORITES_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted session data");
            }
        }
    }

    /// Caller must hold `commit`
    fn publish(&self, session: SessionSnapshot) {
        self.current.store(session.clone());
        self.notify.send_replace(session);
    }

    /// Current session together with the epoch it belongs to
    fn snapshot(&self) -> Option<(u64, Arc<Session>)> {
        let epoch = self.commit.lock();
        self.current.load_full().map(|session| (*epoch, session))
    }

    /// Replace the favorites of the current session if it is still the one
    /// from `epoch`. Returns `false` when the result was discarded.
    fn commit_favorites<F>(&self, epoch: u64, update: F) -> bool
    where
        F: FnOnce(&FavoritesSet) -> FavoritesSet,
    {
        let current_epoch = self.commit.lock();
        if *current_epoch != epoch {
            debug!(epoch, current = *current_epoch, "Discarding result for a replaced session");
            return false;
        }

        let Some(session) = self.current.load_full() else {
            return false;
        };

        let favorites = update(&session.favorites);
        if favorites == session.favorites {
            return true;
        }

        self.persist_favorites(&favorites);
        self.publish(Some(Arc::new(session.with_favorites(favorites))));
        true
    }
}

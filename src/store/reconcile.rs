//! Favorites reconciliation against the remote store.

use tracing::{debug, info, warn};

use super::SessionStore;
use crate::favorites::{CountryCode, FavoritesSet};
use crate::remote::{MutationOutcome, RemoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Add,
    Remove,
}

impl Change {
    fn as_str(self) -> &'static str {
        match self {
            Change::Add => "add",
            Change::Remove => "remove",
        }
    }

    /// Local edit used when the server confirms without saying what changed
    fn apply(self, favorites: &FavoritesSet, code: &CountryCode) -> FavoritesSet {
        let mut next = favorites.clone();
        match self {
            Change::Add => {
                next.insert(code.clone());
            }
            Change::Remove => {
                next.remove(code);
            }
        }
        next
    }
}

impl SessionStore {
    /// Replace the in-memory favorites with the remote list.
    ///
    /// Best effort: failures keep the current set and are only logged.
    /// Returns whether the remote list was applied.
    pub async fn refresh_from_remote(&self) -> bool {
        let _writer = self.writer.lock().await;

        let Some((epoch, session)) = self.snapshot() else {
            debug!("Skipping favorites refresh, no session");
            return false;
        };
        if !session.can_sync() {
            debug!("Skipping favorites refresh, session has no identity");
            return false;
        }

        match self.remote.fetch(&session.user_id, &session.token).await {
            Ok(favorites) => {
                let count = favorites.len();
                let applied = self.commit_favorites(epoch, move |_| favorites);
                if applied {
                    info!(user_id = %session.user_id, count, "Refreshed favorites");
                }
                applied
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "Failed to refresh favorites");
                false
            }
        }
    }

    /// Add `code` to the favorites. Returns whether the server accepted it.
    pub async fn add_favorite(&self, code: &CountryCode) -> bool {
        self.mutate(Change::Add, code).await
    }

    /// Remove `code` from the favorites. Returns whether the server accepted it.
    pub async fn remove_favorite(&self, code: &CountryCode) -> bool {
        self.mutate(Change::Remove, code).await
    }

    async fn mutate(&self, change: Change, code: &CountryCode) -> bool {
        let _writer = self.writer.lock().await;

        let Some((epoch, session)) = self.snapshot() else {
            debug!(code = %code, change = change.as_str(), "Favorites change without a session");
            return false;
        };

        let result = match change {
            Change::Add => {
                self.remote
                    .add(&session.user_id, code, &session.token)
                    .await
            }
            Change::Remove => {
                self.remote
                    .remove(&session.user_id, code, &session.token)
                    .await
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log_failure(change, code, &e);
                return false;
            }
        };

        let applied = self.commit_favorites(epoch, |current| match outcome {
            MutationOutcome::FullUser(favorites) | MutationOutcome::FavoritesOnly(favorites) => {
                favorites
            }
            MutationOutcome::Ambiguous => {
                debug!(code = %code, change = change.as_str(), "No favorites in response, applying local edit");
                change.apply(current, code)
            }
        });

        if applied {
            info!(user_id = %session.user_id, code = %code, change = change.as_str(), "Updated favorites");
        }

        // The server accepted the change even if the session moved on meanwhile
        true
    }
}

fn log_failure(change: Change, code: &CountryCode, error: &RemoteError) {
    warn!(code = %code, change = change.as_str(), error = %error, "Favorites change rejected");
}

pub mod cli;
pub mod config;
pub mod countries;
pub mod favorites;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;

use anyhow::{Context, Result};
use std::sync::Arc;

use config::Config;
use countries::CountryClient;
use remote::{AuthClient, HttpFavoritesRemote};
use storage::FileStore;
use store::SessionStore;

pub use favorites::{CountryCode, FavoritesSet};
pub use session::{Role, Session};

/// Everything a command needs, wired from configuration
pub struct AppState {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub auth: AuthClient,
    pub countries: CountryClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let timeout = config.api.timeout();

        let storage = FileStore::in_dir(&config.storage.data_dir)
            .context("Failed to open session storage")?;
        let remote = HttpFavoritesRemote::new(config.api.base_url.clone(), timeout)
            .context("Failed to create favorites client")?;
        let auth = AuthClient::new(config.api.base_url.clone(), timeout)
            .context("Failed to create auth client")?;
        let countries = CountryClient::new(config.countries.base_url.clone(), timeout)
            .context("Failed to create country data client")?;

        let store = Arc::new(SessionStore::new(Arc::new(storage), Arc::new(remote)));

        Ok(Self {
            config,
            store,
            auth,
            countries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_server::spawn;
    use crate::session::test_tokens::user_token;
    use axum::{extract::State, routing::get, routing::post, Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    type Favorites = Arc<Mutex<Vec<String>>>;

    async fn backend(favorites: Favorites) -> String {
        let router = Router::new()
            .route(
                "/api/auth/login",
                post(|| async { Json(json!({ "token": user_token("u1", "Ann", "user") })) }),
            )
            .route(
                "/api/users/favorites",
                get(|State(favs): State<Favorites>| async move {
                    Json(json!({ "favorites": favs.lock().clone() }))
                }),
            )
            .route(
                "/api/users/favorites/add",
                post(
                    |State(favs): State<Favorites>, Json(body): Json<Value>| async move {
                        let code = body["countryCode"].as_str().unwrap_or_default().to_string();
                        let mut favs = favs.lock();
                        if !favs.contains(&code) {
                            favs.push(code);
                        }
                        Json(json!({ "message": "Added to favorites" }))
                    },
                ),
            )
            .with_state(favorites);
        spawn(router).await
    }

    fn config_for(base_url: &str, data_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.api.base_url = base_url.to_string();
        config.storage.data_dir = data_dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let favorites: Favorites = Arc::new(Mutex::new(vec!["FRA".to_string()]));
        let base_url = backend(favorites.clone()).await;
        let dir = tempfile::TempDir::new().unwrap();

        let first = AppState::new(config_for(&base_url, dir.path())).unwrap();
        assert!(first.store.initialize().await.is_none());

        let token = first.auth.login("ann@example.com", "secret-pass").await.unwrap();
        let session = first.store.login(&token).await.unwrap();
        assert_eq!(session.favorites.len(), 1);

        let ita = CountryCode::parse("ITA").unwrap();
        assert!(first.store.add_favorite(&ita).await);
        assert_eq!(*favorites.lock(), vec!["FRA".to_string(), "ITA".to_string()]);

        // New process: the server gained a favorite in the meantime
        favorites.lock().push("DEU".to_string());
        let second = AppState::new(config_for(&base_url, dir.path())).unwrap();
        let restored = second.store.initialize().await.unwrap();
        assert_eq!(restored.user_id, "u1");
        assert_eq!(restored.favorites.len(), 3);

        second.store.logout();
        let third = AppState::new(config_for(&base_url, dir.path())).unwrap();
        assert!(third.store.initialize().await.is_none());
    }
}

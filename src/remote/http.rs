//! HTTP implementation of the favorites remote store.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{error_message, favorites_from_fetch_body, FavoritesRemote, MutationOutcome, RemoteError};
use crate::favorites::{CountryCode, FavoritesSet};

/// Favorites API client for `{base_url}/api/users/favorites[/add|/remove]`.
#[derive(Debug, Clone)]
pub struct HttpFavoritesRemote {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteChange<'a> {
    user_id: &'a str,
    country_code: &'a str,
}

impl HttpFavoritesRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_change(
        &self,
        path: &str,
        user_id: &str,
        code: &CountryCode,
        token: &str,
    ) -> Result<MutationOutcome, RemoteError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&FavoriteChange {
                user_id,
                country_code: code.as_str(),
            })
            .send()
            .await?;

        let body = read_success_body(response).await?;
        let outcome = MutationOutcome::from_body(&body);
        debug!(url = %url, code = %code, outcome = ?outcome, "Favorites mutation accepted");
        Ok(outcome)
    }
}

/// Return the body of a 2xx response, or the matching error.
pub(crate) async fn read_success_body(response: Response) -> Result<String, RemoteError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    Ok(response.text().await?)
}

#[async_trait]
impl FavoritesRemote for HttpFavoritesRemote {
    async fn fetch(&self, user_id: &str, token: &str) -> Result<FavoritesSet, RemoteError> {
        let url = self.url("/api/users/favorites");
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let body = read_success_body(response).await?;

        let favorites = favorites_from_fetch_body(&body).ok_or_else(|| {
            RemoteError::InvalidResponse("response has no favorites list".to_string())
        })?;

        debug!(user_id = %user_id, count = favorites.len(), "Fetched favorites");
        Ok(favorites)
    }

    async fn add(
        &self,
        user_id: &str,
        code: &CountryCode,
        token: &str,
    ) -> Result<MutationOutcome, RemoteError> {
        self.post_change("/api/users/favorites/add", user_id, code, token)
            .await
    }

    async fn remove(
        &self,
        user_id: &str,
        code: &CountryCode,
        token: &str,
    ) -> Result<MutationOutcome, RemoteError> {
        self.post_change("/api/users/favorites/remove", user_id, code, token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_server::spawn;
    use axum::{
        http::{header::AUTHORIZATION, HeaderMap, StatusCode as AxumStatus},
        response::{IntoResponse, Response as AxumResponse},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    const TOKEN: &str = "test-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|h| h == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }

    async fn get_favorites(headers: HeaderMap) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        Json(json!({ "favorites": ["FRA", "DEU"] })).into_response()
    }

    async fn add_favorite(headers: HeaderMap, Json(body): Json<Value>) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        if body["userId"] != "u1" {
            return (AxumStatus::BAD_REQUEST, Json(json!({ "message": "wrong user" })))
                .into_response();
        }
        let code = body["countryCode"].as_str().unwrap_or_default().to_string();
        Json(json!({ "user": { "id": "u1", "favorites": ["FRA", code] } })).into_response()
    }

    async fn remove_favorite(headers: HeaderMap) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        (AxumStatus::OK, "removed").into_response()
    }

    async fn server() -> HttpFavoritesRemote {
        let router = Router::new()
            .route("/api/users/favorites", get(get_favorites))
            .route("/api/users/favorites/add", post(add_favorite))
            .route("/api/users/favorites/remove", post(remove_favorite));
        let base_url = spawn(router).await;
        HttpFavoritesRemote::new(format!("{}/", base_url), Duration::from_secs(5)).unwrap()
    }

    fn code(s: &str) -> CountryCode {
        CountryCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_favorites() {
        let remote = server().await;
        let favorites = remote.fetch("u1", TOKEN).await.unwrap();
        assert_eq!(favorites.as_slice(), &[code("FRA"), code("DEU")]);
    }

    #[tokio::test]
    async fn test_fetch_with_bad_token_is_unauthorized() {
        let remote = server().await;
        assert_eq!(
            remote.fetch("u1", "wrong").await,
            Err(RemoteError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_add_sends_camel_case_body_and_decodes_user() {
        let remote = server().await;
        let outcome = remote.add("u1", &code("ita"), TOKEN).await.unwrap();
        assert_eq!(
            outcome,
            MutationOutcome::FullUser(vec![code("FRA"), code("ITA")].into())
        );
    }

    #[tokio::test]
    async fn test_add_error_status_carries_message() {
        let remote = server().await;
        let err = remote.add("someone-else", &code("ITA"), TOKEN).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 400,
                message: "wrong user".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_remove_plain_text_success_is_ambiguous() {
        let remote = server().await;
        let outcome = remote.remove("u1", &code("FRA"), TOKEN).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Ambiguous);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote =
            HttpFavoritesRemote::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            remote.fetch("u1", TOKEN).await,
            Err(RemoteError::Network(_))
        ));
    }
}

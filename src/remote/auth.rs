//! Token issuer client (`/api/auth/login`, `/api/auth/register`).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::http::read_success_body;
use super::RemoteError;

/// Minimum password length accepted at registration
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Registration form, sent as-is to the backend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Validate a registration form before sending it.
/// Returns None if valid, or Some(error_message) if invalid
pub fn validate_registration(request: &RegistrationRequest) -> Option<String> {
    if request.name.trim().is_empty() {
        return Some("Name is required.".to_string());
    }
    if !request.email.contains('@') {
        return Some("Email address is invalid.".to_string());
    }
    if request.password != request.confirm_password {
        return Some("Passwords do not match.".to_string());
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        ));
    }
    None
}

/// Client for the authentication backend
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    client: Client,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        // Bad credentials come back as 401 with a message worth showing
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: super::error_message(&body),
            });
        }

        let body = read_success_body(response).await?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| RemoteError::InvalidResponse(format!("login response: {}", e)))?;

        info!(email = %email, "Obtained token from auth backend");
        Ok(parsed.token)
    }

    /// Create an account. Validation failures never reach the network.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<(), RemoteError> {
        if let Some(message) = validate_registration(request) {
            return Err(RemoteError::Status {
                status: 400,
                message,
            });
        }

        let response = self
            .client
            .post(format!("{}/api/auth/register", self.base_url))
            .json(request)
            .send()
            .await?;

        read_success_body(response).await?;
        info!(email = %request.email, "Registered account");
        Ok(())
    }
}

//! HTTP identity backend.
//!
//! Speaks the JSON dialect of the original PHP endpoints: `login.php` for
//! login plus `?action=check` / `?action=logout`, and `register.php` for
//! account creation. Responses carry `success`, `logged_in`, `user_id`,
//! `username` and `message` fields.

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{IdentityBackend, SessionProbe};
use super::error::SessionError;
use super::identity::Identity;

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
}

pub struct HttpIdentityBackend {
    config: HttpBackendConfig,
    client: reqwest::Client,
}

impl HttpIdentityBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn read_body(response: reqwest::Response) -> Result<(u16, String), SessionError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;
        Ok((status, text))
    }

    fn parse_identity(body: &Value) -> Result<Identity, SessionError> {
        let id = body
            .get("user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| SessionError::InvalidResponse("missing user_id".to_string()))?;
        let display_name = body
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::InvalidResponse("missing username".to_string()))?
            .to_string();
        Ok(Identity { id, display_name })
    }

    fn map_failure(status: u16, body: &str) -> SessionError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());
        match status {
            401 => SessionError::InvalidCredentials,
            400 | 409 => SessionError::Rejected(message),
            _ => SessionError::Network(format!("status {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn check_session(&self) -> Result<SessionProbe, SessionError> {
        let url = format!("{}?action=check", self.endpoint("login.php"));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        if !(200..300).contains(&status) {
            return Err(SessionError::Network(format!("status {}", status)));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
        match body.get("logged_in").and_then(Value::as_bool) {
            Some(true) => Ok(SessionProbe::SignedIn(Self::parse_identity(&body)?)),
            Some(false) => Ok(SessionProbe::SignedOut),
            None => Err(SessionError::InvalidResponse(
                "missing logged_in field".to_string(),
            )),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError> {
        let payload = serde_json::json!({
            "username": username,
            "password": password,
        });
        let response = self
            .client
            .post(self.endpoint("login.php"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        if !(200..300).contains(&status) {
            return Err(Self::map_failure(status, &text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(SessionError::InvalidCredentials);
        }
        Self::parse_identity(&body)
    }

    async fn logout(&self) -> Result<(), SessionError> {
        let url = format!("{}?action=logout", self.endpoint("login.php"));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let (status, _text) = Self::read_body(response).await?;
        if !(200..300).contains(&status) {
            return Err(SessionError::Network(format!("status {}", status)));
        }
        Ok(())
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        let payload = serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        });
        let response = self
            .client
            .post(self.endpoint("register.php"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        if !(200..300).contains(&status) {
            return Err(Self::map_failure(status, &text));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("registration failed");
            return Err(SessionError::Rejected(message.to_string()));
        }
        Self::parse_identity(&body)
    }
}

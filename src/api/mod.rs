//! Backend RPC client
//!
//! Typed surface over the portfolio backend's HTTP API. The [`BackendApi`]
//! trait is the seam the dispatcher and poll loop depend on; production uses
//! the reqwest-backed [`HttpBackend`], tests script an in-crate mock.

pub mod types;

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub use types::{
    AckStatus, Command, DashboardSummary, Holding, LoginResponse, PollResponse, PriceSource,
    SellAmount, SellIntent, SellOverview, SellPreview, SellResult,
};

/// Typed operations the agent consumes from the backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Swap the bearer token used for subsequent requests.
    fn set_token(&self, token: Option<SecretString>);

    /// Authenticate and adopt the returned token for subsequent requests.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;
    async fn logout(&self) -> Result<()>;
    async fn get_dashboard(&self) -> Result<DashboardSummary>;
    async fn get_sell_overview(&self) -> Result<SellOverview>;
    async fn get_transactions(&self) -> Result<Value>;
    /// Non-binding quote for a prospective sell.
    async fn preview_sell(&self, intent: &SellIntent) -> Result<SellPreview>;
    async fn execute_sell(&self, intent: &SellIntent) -> Result<SellResult>;
    async fn poll_commands(
        &self,
        target_device: &str,
        target_device_id: Option<&str>,
        limit: u32,
    ) -> Result<PollResponse>;
    async fn acknowledge_command(&self, command_id: i64, status: AckStatus) -> Result<()>;
}

/// reqwest-backed client for the portfolio backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl HttpBackend {
    /// Build a client for `base_url`.
    ///
    /// `verify_ssl = false` accepts self-signed certificates, which is what
    /// local dev backends present.
    pub fn new(base_url: &str, token: Option<SecretString>, verify_ssl: bool) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid API base URL {}: {}", base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: RwLock::new(token),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid API path {}: {}", path, e)))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(method.clone(), url)
            .header("accept", "application/json");
        if let Some(token) = self.token.read().expect("token lock poisoned").as_ref() {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, path, "Backend request");
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: extract_error_message(&text),
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> Result<T> {
        let response = self.send(method, path, query, body).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    fn set_token(&self, token: Option<SecretString>) {
        *self.token.write().expect("token lock poisoned") = token;
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response: LoginResponse = self
            .request_json(Method::POST, "/auth/login", None, Some(&body))
            .await?;
        match response.access_token.as_deref() {
            Some(token) if !token.is_empty() => {
                self.set_token(Some(SecretString::from(token.to_string())));
                Ok(response)
            }
            _ => Err(Error::Api {
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                message: "login succeeded but token missing".to_string(),
            }),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.send(Method::POST, "/auth/logout", None, None).await?;
        self.set_token(None);
        Ok(())
    }

    async fn get_dashboard(&self) -> Result<DashboardSummary> {
        self.request_json(Method::GET, "/crypto/dashboard", None, None)
            .await
    }

    async fn get_sell_overview(&self) -> Result<SellOverview> {
        self.request_json(Method::GET, "/crypto/sell/overview", None, None)
            .await
    }

    async fn get_transactions(&self) -> Result<Value> {
        self.request_json(Method::GET, "/crypto/transactions", None, None)
            .await
    }

    async fn preview_sell(&self, intent: &SellIntent) -> Result<SellPreview> {
        let body = intent.to_body();
        self.request_json(Method::POST, "/crypto/sell/preview", None, Some(&body))
            .await
    }

    async fn execute_sell(&self, intent: &SellIntent) -> Result<SellResult> {
        let body = intent.to_body();
        self.request_json(Method::POST, "/crypto/sell", None, Some(&body))
            .await
    }

    async fn poll_commands(
        &self,
        target_device: &str,
        target_device_id: Option<&str>,
        limit: u32,
    ) -> Result<PollResponse> {
        let mut query = vec![
            ("target_device", target_device.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(device_id) = target_device_id {
            query.push(("target_device_id", device_id.to_string()));
        }
        self.request_json(Method::GET, "/crypto/device-commands/poll", Some(&query), None)
            .await
    }

    async fn acknowledge_command(&self, command_id: i64, status: AckStatus) -> Result<()> {
        let body = serde_json::json!({ "status": status });
        self.send(
            Method::POST,
            &format!("/crypto/device-commands/{}/ack", command_id),
            None,
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

/// Pull a human-readable message out of an error body: JSON `detail` or
/// `message` keys first, raw text otherwise.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "unexpected API error".to_string()
    } else {
        body.trim().to_string()
    }
}

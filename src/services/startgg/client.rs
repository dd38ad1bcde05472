// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg HTTP client: GraphQL requests and OAuth token endpoints.
//!
//! Handles:
//! - GraphQL POSTs with bearer auth and error extraction
//! - A single retry after a 401, with a caller-supplied token refresh
//! - Authorization code exchange and refresh-token grants

use crate::config::Config;
use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;

/// Fallback when a failed response carries nothing readable.
const GENERIC_FAILURE: &str = "Failed to call start.gg";

/// start.gg API client.
#[derive(Clone)]
pub struct StartggClient {
    http: reqwest::Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: Option<String>,
}

/// Response of the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Granted scopes; start.gg separates them with spaces.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

impl StartggClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.startgg_api_url.clone(),
            token_url: config.startgg_token_url.clone(),
            client_id: config.startgg_client_id.clone(),
            client_secret: config.startgg_client_secret.clone(),
            redirect_uri: config.startgg_redirect_uri.clone(),
        }
    }

    /// Run a GraphQL operation and return its `data`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        access_token: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AppError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StartggApi(format!("{}: {}", GENERIC_FAILURE, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.as_u16() == 401 {
            tracing::warn!(status = %status, "start.gg rejected access token");
            let detail = (!text.trim().is_empty()).then(|| extract_error_message(&text));
            return Err(AppError::startgg_token_rejected(detail.as_deref()));
        }

        if !status.is_success() {
            tracing::warn!(status = %status, "start.gg request failed");
            return Err(AppError::StartggApi(extract_error_message(&text)));
        }

        let parsed: GraphQlResponse<T> = serde_json::from_str(&text)
            .map_err(|e| AppError::StartggApi(format!("JSON parse error: {}", e)))?;

        if let Some(first) = parsed.errors.as_deref().and_then(|errs| errs.first()) {
            let message = first
                .message
                .clone()
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Err(AppError::StartggApi(message));
        }

        parsed
            .data
            .ok_or_else(|| AppError::StartggApi("start.gg returned no data".to_string()))
    }

    /// Like [`query`](Self::query), but after a rejected token calls `refresh`
    /// once and retries with the token it returns.
    pub async fn query_with_refresh<T, R, Fut>(
        &self,
        access_token: &str,
        query: &str,
        variables: serde_json::Value,
        refresh: R,
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, AppError>>,
    {
        match self.query(access_token, query, variables.clone()).await {
            Err(e) if e.is_startgg_token_error() => {
                let fresh = refresh().await?;
                self.query(&fresh, query, variables).await
            }
            other => other,
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::StartggApi(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::error!(status = %status, "start.gg token request failed");
            return Err(AppError::StartggApi(extract_error_message(&text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| AppError::StartggApi(format!("Failed to parse token response: {}", e)))
    }
}

/// Best-effort message from a failed start.gg response body.
///
/// Looks at `errors[0].message`, then `error` (string or JSON), then
/// `message`, then the raw body.
pub fn extract_error_message(body: &str) -> String {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let trimmed = body.trim();
            return if trimmed.is_empty() {
                GENERIC_FAILURE.to_string()
            } else {
                trimmed.to_string()
            };
        }
    };

    if let Some(msg) = json
        .pointer("/errors/0/message")
        .and_then(|v| v.as_str())
    {
        return msg.to_string();
    }

    match json.get("error") {
        Some(serde_json::Value::String(s)) => return s.clone(),
        Some(serde_json::Value::Null) | None => {}
        Some(other) => return other.to_string(),
    }

    if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
        return msg.to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        trimmed.to_string()
    }
}

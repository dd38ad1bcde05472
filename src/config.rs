//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables, so everything is read
//! once at startup and kept in memory.

use std::env;

/// Default start.gg GraphQL endpoint.
pub const DEFAULT_STARTGG_API_URL: &str = "https://api.start.gg/gql/alpha";
/// Default start.gg OAuth authorize endpoint.
pub const DEFAULT_STARTGG_AUTHORIZE_URL: &str = "https://start.gg/oauth/authorize";
/// Default start.gg OAuth token endpoint.
pub const DEFAULT_STARTGG_TOKEN_URL: &str = "https://api.start.gg/oauth/access_token";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// start.gg OAuth client ID (public)
    pub startgg_client_id: String,
    /// OAuth redirect URI registered with start.gg
    pub startgg_redirect_uri: String,
    /// GraphQL endpoint
    pub startgg_api_url: String,
    /// OAuth authorize endpoint
    pub startgg_authorize_url: String,
    /// OAuth token endpoint (code exchange and refresh)
    pub startgg_token_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public URL of this API (used for re-authentication hints)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// start.gg OAuth client secret
    pub startgg_client_secret: String,
    /// Application-level start.gg token used for admin lookups
    pub startgg_app_token: Option<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self::test_default()
    }
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            startgg_client_id: "test_client_id".to_string(),
            startgg_redirect_uri: "http://localhost:8080/auth/callback".to_string(),
            startgg_api_url: DEFAULT_STARTGG_API_URL.to_string(),
            startgg_authorize_url: DEFAULT_STARTGG_AUTHORIZE_URL.to_string(),
            startgg_token_url: DEFAULT_STARTGG_TOKEN_URL.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            port: 8080,
            startgg_client_secret: "test_secret".to_string(),
            startgg_app_token: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_url = env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        Ok(Self {
            startgg_client_id: required("STARTGG_CLIENT_ID")?,
            startgg_redirect_uri: env::var("STARTGG_REDIRECT_URI")
                .unwrap_or_else(|_| format!("{}/auth/callback", api_url)),
            startgg_api_url: env::var("STARTGG_API_URL")
                .unwrap_or_else(|_| DEFAULT_STARTGG_API_URL.to_string()),
            startgg_authorize_url: env::var("STARTGG_OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|_| DEFAULT_STARTGG_AUTHORIZE_URL.to_string()),
            startgg_token_url: env::var("STARTGG_OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_STARTGG_TOKEN_URL.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            startgg_client_secret: required("STARTGG_CLIENT_SECRET")?,
            startgg_app_token: env::var("STARTGG_APP_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
        })
    }

    /// URL the frontend should send a user to when a scope is missing.
    pub fn reauth_url(&self) -> String {
        format!("{}/auth/login", self.api_url.trim_end_matches('/'))
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("STARTGG_CLIENT_ID", "test_id");
        env::set_var("STARTGG_CLIENT_SECRET", " test_secret ");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("OAUTH_STATE_KEY", "test_state_key");
        env::set_var("API_URL", "https://api.example.com");
        env::remove_var("STARTGG_REDIRECT_URI");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.startgg_client_id, "test_id");
        assert_eq!(config.startgg_client_secret, "test_secret");
        assert_eq!(
            config.startgg_redirect_uri,
            "https://api.example.com/auth/callback"
        );
        assert_eq!(config.startgg_api_url, DEFAULT_STARTGG_API_URL);
        assert_eq!(config.reauth_url(), "https://api.example.com/auth/login");
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The provider token lacks a scope the action needs; the caller should log in again.
    #[error("Insufficient scopes: {message}")]
    InsufficientScope { message: String, reauth_url: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Input failed domain validation; one message per offending item.
    #[error("Validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error("Conflict: {message}")]
    Conflict { message: String, report_id: String },

    #[error("start.gg API error: {0}")]
    StartggApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message for a rejected provider access token (HTTP 401).
    pub const STARTGG_TOKEN_ERROR: &'static str = "start.gg access token rejected";

    /// A rejected access token, keeping the provider's own message when there is one.
    pub fn startgg_token_rejected(detail: Option<&str>) -> Self {
        match detail {
            Some(detail) => {
                AppError::StartggApi(format!("{}: {}", Self::STARTGG_TOKEN_ERROR, detail))
            }
            None => AppError::StartggApi(Self::STARTGG_TOKEN_ERROR.to_string()),
        }
    }

    /// Whether this error means the provider refused our access token.
    pub fn is_startgg_token_error(&self) -> bool {
        matches!(self, AppError::StartggApi(msg) if msg.starts_with(Self::STARTGG_TOKEN_ERROR))
    }

    /// Whether a provider error message is about missing OAuth scopes.
    pub fn is_scope_error(&self) -> bool {
        matches!(self, AppError::StartggApi(msg) if Self::is_scope_message(msg))
    }

    pub fn is_scope_message(msg: &str) -> bool {
        let msg = msg.to_lowercase();
        msg.contains("scope") || msg.contains("tournament.reporter")
    }
}

/// JSON error response body
#[derive(Serialize, Default)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reauth_url: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = ErrorResponse::default();

        let status = match self {
            AppError::Unauthorized => {
                body.error = "unauthorized".into();
                StatusCode::UNAUTHORIZED
            }
            AppError::InvalidToken => {
                body.error = "invalid_token".into();
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(msg) => {
                body.error = "forbidden".into();
                body.details = Some(msg);
                StatusCode::FORBIDDEN
            }
            AppError::InsufficientScope {
                message,
                reauth_url,
            } => {
                body.error = "insufficient_scope".into();
                body.details = Some(message);
                body.action = Some("reauthenticate");
                body.reauth_url = Some(reauth_url);
                StatusCode::FORBIDDEN
            }
            AppError::NotFound(msg) => {
                body.error = "not_found".into();
                body.details = Some(msg);
                StatusCode::NOT_FOUND
            }
            AppError::BadRequest(msg) => {
                body.error = "bad_request".into();
                body.details = Some(msg);
                StatusCode::BAD_REQUEST
            }
            AppError::Validation(errors) => {
                body.error = "validation_failed".into();
                body.errors = Some(errors);
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Conflict { message, report_id } => {
                body.error = "conflict".into();
                body.details = Some(message);
                body.report_id = Some(report_id);
                StatusCode::CONFLICT
            }
            AppError::StartggApi(msg) => {
                tracing::error!(error = %msg, "start.gg API error");
                body.error = "startgg_error".into();
                body.details = Some(msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                body.error = "database_error".into();
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                body.error = "internal_error".into();
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting start.gg OAuth tokens.
//!
//! Uses direct KMS encryption (not envelope encryption). Each token is bound
//! to its owner through additional authenticated data, so a ciphertext copied
//! onto another user's record will not decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "startgg-manager";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext, optionally bound to `aad`.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        // Mock mode (Debug builds only): tag the payload with the AAD so
        // mismatches are caught the same way real KMS would.
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                let tagged = match aad {
                    Some(aad) => format!("AAD:{}:{}", hex::encode(aad), plaintext),
                    None => format!("NOAAD:{}", plaintext),
                };
                return Ok(BASE64.encode(tagged));
            }
        }

        // In release builds a missing client is an error rather than a
        // silent plaintext fallback.
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext that was encrypted with the same `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Self::mock_decrypt(ciphertext, aad);
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }

    #[cfg(debug_assertions)]
    fn mock_decrypt(bytes: Vec<u8>, aad: Option<&[u8]>) -> Result<String, AppError> {
        let tagged = String::from_utf8(bytes).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e))
        })?;

        let plaintext = match aad {
            Some(aad) => {
                let prefix = format!("AAD:{}:", hex::encode(aad));
                tagged.strip_prefix(&prefix)
            }
            None => tagged.strip_prefix("NOAAD:"),
        };

        plaintext
            .map(str::to_string)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS decrypt failed (mock): AAD mismatch")))
    }
}

/// AAD binding a token to its owner.
fn token_aad(user_id: u64) -> String {
    format!("startgg_user_id:{}", user_id)
}

/// Helper to encrypt OAuth tokens before storing.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: Option<&str>,
    user_id: u64,
) -> Result<(String, Option<String>), AppError> {
    let aad = token_aad(user_id);
    let encrypted_access = kms.encrypt(access_token, Some(aad.as_bytes())).await?;
    let encrypted_refresh = match refresh_token {
        Some(token) => Some(kms.encrypt(token, Some(aad.as_bytes())).await?),
        None => None,
    };
    Ok((encrypted_access, encrypted_refresh))
}

/// Helper to decrypt a single stored token.
pub async fn decrypt_token(
    kms: &KmsService,
    encrypted: &str,
    user_id: u64,
) -> Result<String, AppError> {
    let aad = token_aad(user_id);
    kms.decrypt(encrypted, Some(aad.as_bytes())).await
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use serde::{Deserialize, Serialize};

/// In-progress report form for one user and set.
///
/// The frontend owns the shape of `data`; it is stored as a JSON string so
/// Firestore does not need to understand it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDraft {
    pub set_id: String,
    pub user_id: u64,
    pub data: String,
    pub updated_at: String,
}

impl SetDraft {
    pub fn doc_id(set_id: &str, user_id: u64) -> String {
        format!("{}_{}", set_id, user_id)
    }
}

/// Draft as returned by the API, with `data` decoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub set_id: String,
    pub data: serde_json::Value,
    pub updated_at: String,
}

impl TryFrom<SetDraft> for DraftView {
    type Error = serde_json::Error;

    fn try_from(draft: SetDraft) -> Result<Self, Self::Error> {
        Ok(Self {
            data: serde_json::from_str(&draft.data)?,
            set_id: draft.set_id,
            updated_at: draft.updated_at,
        })
    }
}

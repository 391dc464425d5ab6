//! Durable promise records as exchanged with the promise store.
//!
//! Field names and state spellings follow the store's REST representation
//! (camelCase fields, SCREAMING_SNAKE_CASE states) so the same structs are
//! used for both the remote client and the in-process store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a durable promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromiseState {
    Pending,
    Resolved,
    Rejected,
    RejectedCanceled,
    RejectedTimedout,
}

impl PromiseState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_completed(&self) -> bool {
        !self.is_pending()
    }

    /// Returns true for any of the rejected variants.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected | Self::RejectedCanceled | Self::RejectedTimedout)
    }
}

/// Payload attached to a promise, either as its parameter or as its completion value.
///
/// `data` holds base64 text; the workspace always stores JSON underneath.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A durable promise as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromiseRecord {
    pub id: String,
    pub state: PromiseState,
    #[serde(default)]
    pub param: PromiseValue,
    #[serde(default)]
    pub value: PromiseValue,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub timeout: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key_for_create: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key_for_complete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<i64>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
}

/// Body of a create-promise request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePromise {
    pub id: String,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub timeout: i64,
    #[serde(default)]
    pub param: PromiseValue,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, String>,
}

impl CreatePromise {
    pub fn new(id: impl Into<String>, timeout: i64) -> Self {
        Self {
            id: id.into(),
            timeout,
            param: PromiseValue::default(),
            tags: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, param: PromiseValue) -> Self {
        self.param = param;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Body of a complete-promise request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePromise {
    pub state: PromiseState,
    #[serde(default)]
    pub value: PromiseValue,
}

impl CompletePromise {
    pub fn resolved(value: PromiseValue) -> Self {
        Self {
            state: PromiseState::Resolved,
            value,
        }
    }

    pub fn rejected(value: PromiseValue) -> Self {
        Self {
            state: PromiseState::Rejected,
            value,
        }
    }
}

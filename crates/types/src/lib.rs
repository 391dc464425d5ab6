//! Shared type definitions for the Pledge workspace.
//!
//! The wire types here mirror two external APIs:
//!
//! - the durable promise store (Resonate-compatible REST), see [`promise`]
//! - the Databricks Jobs API `run-now` call, see [`job`]
//!
//! plus the small status vocabulary returned by the trigger endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod job;
pub mod promise;

pub use job::{RunNowRequest, RunNowResponse};
pub use promise::{CompletePromise, CreatePromise, PromiseRecord, PromiseState, PromiseValue};

/// Tag placed on root promises so the store can tell invocations apart from child promises.
pub const INVOKE_TAG: &str = "pledge:invoke";

/// Status reported by the trigger endpoint for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The invocation's root promise has completed.
    Done,
    /// The invocation is still pending.
    InProgress,
}

impl RunStatus {
    pub fn from_done(done: bool) -> Self {
        if done { Self::Done } else { Self::InProgress }
    }

    /// Plain-text message returned to HTTP callers.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Done => "I'm done",
            Self::InProgress => "working on it",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

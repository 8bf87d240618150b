// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the error type reported by session implementations.

use super::NodeId;
use std::fmt;

/// An error raised by a [`Session`](super::Session) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session is not connected or was restarted.
    Unavailable,
    /// The node does not exist in the session.
    InvalidNode(NodeId),
    /// A definition library could not be loaded.
    LoadFailed {
        /// Human-readable description of the library source.
        source: String,
        /// Why the load failed.
        reason: String,
    },
    /// A named definition, library, or material could not be found.
    NotFound(String),
    /// Any other failed call.
    CallFailed {
        /// Name of the failing call.
        call: &'static str,
        /// Details reported by the session.
        details: String,
    },
}

impl SessionError {
    /// Shorthand for a [`SessionError::CallFailed`].
    pub fn call_failed(call: &'static str, details: impl Into<String>) -> Self {
        SessionError::CallFailed {
            call,
            details: details.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unavailable => write!(f, "No valid session is available"),
            SessionError::InvalidNode(node) => write!(f, "Node {node} is not valid in the session"),
            SessionError::LoadFailed { source, reason } => {
                write!(f, "Failed to load library '{source}': {reason}")
            }
            SessionError::NotFound(name) => write!(f, "'{name}' was not found in the session"),
            SessionError::CallFailed { call, details } => {
                write!(f, "Session call '{call}' failed: {details}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Result alias for session calls.
pub type SessionResult<T> = Result<T, SessionError>;

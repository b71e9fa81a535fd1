//! Session target identifiers and socket URL construction
//!
//! A `SessionTarget` names the room a client wants to join and who is joining.
//! The socket URL shape is part of the server contract:
//! `ws://<host>/ws/game/<sessionId>?token=<userId>[&character_id=<characterId>]`

use serde::{Deserialize, Serialize};
use url::Url;

/// Errors constructing a session target or its socket URL.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("base URL cannot carry path segments: {0}")]
    InvalidBase(Url),
}

/// Identifies the room to join and the joining user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTarget {
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

impl SessionTarget {
    /// Create a target, validating that both identifiers are non-empty.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        character_id: Option<String>,
    ) -> Result<Self, TargetError> {
        let session_id = session_id.into();
        let user_id = user_id.into();
        if session_id.trim().is_empty() {
            return Err(TargetError::EmptyField("session_id"));
        }
        if user_id.trim().is_empty() {
            return Err(TargetError::EmptyField("user_id"));
        }
        Ok(Self {
            session_id,
            user_id,
            character_id,
        })
    }

    /// Build the socket URL for this target against a `ws://` / `wss://` base.
    pub fn socket_url(&self, base: &Url) -> Result<Url, TargetError> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TargetError::InvalidBase(base.clone()))?;
            segments.pop_if_empty();
            segments.push("ws");
            segments.push("game");
            segments.push(&self.session_id);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.user_id);
            if let Some(character_id) = &self.character_id {
                query.append_pair("character_id", character_id);
            }
        }
        Ok(url)
    }
}

//! Chat identification types.
//!
//! A chat is either a multi-member room or a direct conversation; the pair
//! of kind and id uniquely identifies a subscribable stream.

use serde::{Deserialize, Serialize};

/// Which kind of chat a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// A multi-member room.
    Room,
    /// A direct conversation between two users.
    Conversation,
}

impl ChatKind {
    /// Path segment used in topics and destinations ("room"/"conversation").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Conversation => "conversation",
        }
    }
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identifier for a subscribable chat stream.
///
/// At most one ChatKey is active at any time; activating a new chat always
/// leaves the previous one first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatKey {
    /// Room or conversation.
    pub kind: ChatKind,
    /// Server-assigned chat id, unique per kind.
    pub id: i64,
}

impl ChatKey {
    /// Key for a room.
    pub fn room(id: i64) -> Self {
        Self {
            kind: ChatKind::Room,
            id,
        }
    }

    /// Key for a direct conversation.
    pub fn conversation(id: i64) -> Self {
        Self {
            kind: ChatKind::Conversation,
            id,
        }
    }
}

impl std::fmt::Display for ChatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

//! Directory endpoints: conversations, rooms, and contacts listings.

use serde::{Deserialize, Serialize};

use relay_core::error::RelayResult;
use relay_models::User;

use crate::client::ApiClient;
use crate::response::Page;

/// A direct conversation as listed in the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: i64,
    /// Title shown in the list (the other participant's display name).
    #[serde(default)]
    pub title: Option<String>,
    /// Preview of the most recent message.
    #[serde(default)]
    pub last_message: Option<String>,
    /// Number of unread messages.
    #[serde(default)]
    pub unread_count: u32,
}

/// A room as listed in the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u32,
}

/// A contact entry: the related user plus presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    /// The contact's user record.
    pub contact: User,
    /// Whether the contact is currently online.
    #[serde(default)]
    pub is_online: bool,
}

impl ApiClient {
    /// List the current user's direct conversations.
    pub async fn conversations(&self, page: u32, size: u32) -> RelayResult<Page<ConversationSummary>> {
        self.get_json(&format!("/conversations?page={page}&size={size}"))
            .await
    }

    /// List the rooms visible to the current user.
    pub async fn rooms(&self, page: u32, size: u32) -> RelayResult<Page<RoomSummary>> {
        self.get_json(&format!("/rooms?page={page}&size={size}"))
            .await
    }

    /// List accepted contacts.
    pub async fn contacts(&self, page: u32, size: u32) -> RelayResult<Page<ContactSummary>> {
        self.get_json(&format!(
            "/users/contacts?status=ACCEPTED&page={page}&size={size}"
        ))
        .await
    }
}

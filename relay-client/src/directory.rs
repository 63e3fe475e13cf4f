//! Directory snapshot: conversations, rooms, and contacts.
//!
//! Loaded once after authentication and kept as an in-memory snapshot for
//! the rendering layer. Contact presence is updated from the session-wide
//! presence broadcast.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use relay_api::endpoints::directory::{ContactSummary, ConversationSummary, RoomSummary};
use relay_api::ApiClient;
use relay_core::constants;
use relay_socket::events::PresenceUpdate;

use crate::event_bus::{AppEvent, EventBus};

struct DirectoryInner {
    bus: EventBus,
    conversations: Mutex<Vec<ConversationSummary>>,
    rooms: Mutex<Vec<RoomSummary>>,
    contacts: Mutex<Vec<ContactSummary>>,
}

/// In-memory directory snapshot. Cheap to clone; state is shared.
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

impl Directory {
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                bus,
                conversations: Mutex::new(Vec::new()),
                rooms: Mutex::new(Vec::new()),
                contacts: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Load the first page of each listing. Each fetch is independent and
    /// best-effort; a failed one leaves its previous snapshot in place.
    pub async fn load(&self, api: &ApiClient) {
        let size = constants::DIRECTORY_PAGE_SIZE;

        match api.conversations(0, size).await {
            Ok(page) => *self.inner.conversations.lock().unwrap() = page.content,
            Err(e) => warn!("conversation listing failed: {e}"),
        }
        match api.rooms(0, size).await {
            Ok(page) => *self.inner.rooms.lock().unwrap() = page.content,
            Err(e) => warn!("room listing failed: {e}"),
        }
        match api.contacts(0, size).await {
            Ok(page) => *self.inner.contacts.lock().unwrap() = page.content,
            Err(e) => warn!("contact listing failed: {e}"),
        }

        let (conversations, rooms, contacts) = (
            self.inner.conversations.lock().unwrap().len(),
            self.inner.rooms.lock().unwrap().len(),
            self.inner.contacts.lock().unwrap().len(),
        );
        debug!("directory loaded: {conversations} conversations, {rooms} rooms, {contacts} contacts");
        self.inner.bus.emit(AppEvent::DirectoryUpdated {
            conversations,
            rooms,
            contacts,
        });
    }

    /// Apply a presence update to the contact snapshot.
    pub fn apply_presence(&self, update: PresenceUpdate) {
        let mut contacts = self.inner.contacts.lock().unwrap();
        for entry in contacts.iter_mut() {
            if entry.contact.id == update.user_id {
                entry.is_online = update.is_online;
            }
        }
        drop(contacts);

        self.inner.bus.emit(AppEvent::PresenceChanged {
            user_id: update.user_id,
            is_online: update.is_online,
        });
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.inner.conversations.lock().unwrap().clone()
    }

    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.inner.rooms.lock().unwrap().clone()
    }

    pub fn contacts(&self) -> Vec<ContactSummary> {
        self.inner.contacts.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_models::User;

    #[test]
    fn test_presence_update_marks_contact_online() {
        let directory = Directory::new(EventBus::new(16));
        directory.inner.contacts.lock().unwrap().push(ContactSummary {
            contact: User {
                id: 9,
                username: "bob".into(),
                full_name: None,
                email: None,
            },
            is_online: false,
        });

        directory.apply_presence(PresenceUpdate {
            user_id: 9,
            username: Some("bob".into()),
            is_online: true,
        });
        assert!(directory.contacts()[0].is_online);

        directory.apply_presence(PresenceUpdate {
            user_id: 9,
            username: Some("bob".into()),
            is_online: false,
        });
        assert!(!directory.contacts()[0].is_online);
    }

    #[test]
    fn test_presence_for_unknown_user_is_harmless() {
        let directory = Directory::new(EventBus::new(16));
        directory.apply_presence(PresenceUpdate {
            user_id: 404,
            username: None,
            is_online: true,
        });
        assert!(directory.contacts().is_empty());
    }
}

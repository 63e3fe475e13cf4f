//! REST response types.
//!
//! The server returns plain bodies: paginated queries use a page envelope
//! with a `content` array, newest entries first.

use serde::{Deserialize, Serialize};

/// A page of results from a paginated endpoint.
///
/// History pages are ordered newest-first; the caller reverses them before
/// building an oldest-first canonical list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The entries in this page.
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    /// Zero-based page index.
    #[serde(default)]
    pub number: u32,
    /// Page size requested.
    #[serde(default)]
    pub size: u32,
    /// Total entries across all pages.
    #[serde(default)]
    pub total_elements: u64,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
    /// Whether this is the final page.
    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    /// An empty page.
    pub fn empty() -> Self {
        Self {
            content: Vec::new(),
            number: 0,
            size: 0,
            total_elements: 0,
            total_pages: 0,
            last: true,
        }
    }
}

/// Location of a message within its chat's paginated history.
///
/// Returned by the locate-page endpoint; used for jump-to-message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLocation {
    /// Zero-based page index containing the message.
    pub page_number: u32,
    /// Set when the message belongs to a room.
    #[serde(default)]
    pub room_id: Option<i64>,
    /// Set when the message belongs to a direct conversation.
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_parses_spring_body() {
        let json = serde_json::json!({
            "content": [3, 2, 1],
            "number": 0,
            "size": 50,
            "totalElements": 3,
            "totalPages": 1,
            "last": true
        });
        let page: Page<i64> = serde_json::from_value(json).unwrap();
        assert_eq!(page.content, vec![3, 2, 1]);
        assert!(page.last);
    }

    #[test]
    fn test_page_defaults_when_fields_missing() {
        let page: Page<i64> = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[test]
    fn test_page_location_room() {
        let json = serde_json::json!({"pageNumber": 4, "roomId": 12});
        let loc: PageLocation = serde_json::from_value(json).unwrap();
        assert_eq!(loc.page_number, 4);
        assert_eq!(loc.room_id, Some(12));
        assert_eq!(loc.conversation_id, None);
    }
}

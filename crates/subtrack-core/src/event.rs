// ABOUTME: Projection row for application events returned by the recent-events query.
// ABOUTME: Shaped for direct serialization toward the caller; the tag field serializes as "type".

use serde::{Deserialize, Serialize};

/// One application event, most-recent-first in query results. The timestamp
/// is the stored second-precision text (`%Y-%m-%dT%H:%M:%S`, no timezone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_row_serializes_tag_as_type() {
        let row = EventRow {
            timestamp: "2024-05-01T12:00:00".to_string(),
            event_type: "download".to_string(),
            message: "Episode downloaded".to_string(),
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "download");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00");
        assert_eq!(json["message"], "Episode downloaded");
        assert!(json.get("event_type").is_none());
    }

    #[test]
    fn event_row_deserializes_from_type_tag() {
        let row: EventRow = serde_json::from_str(
            r#"{"timestamp":"2024-05-01T12:00:00","type":"grab","message":"Grabbed"}"#,
        )
        .unwrap();
        assert_eq!(row.event_type, "grab");
    }
}

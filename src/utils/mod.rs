pub mod retry;
pub mod logging;

/// Trim `value`, treating blank text as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One-line rendering of an event for terminal output.
pub fn summarize_event(event: &crate::models::EventRecord) -> String {
    let mut line = format!(
        "[{}] {}{}",
        if event.is_rsvped { "x" } else { " " },
        event.title(),
        non_empty(event.category.as_deref())
            .map(|c| format!(" ({})", c))
            .unwrap_or_default(),
    );
    if let Some(date) = non_empty(event.date.as_deref()) {
        line.push_str(&format!(" | {}", date));
    }
    if let Some(location) = non_empty(event.location.as_deref()) {
        line.push_str(&format!(" | {}", location));
    }
    line.push_str(&format!(" | id={}", event.id));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, EventRecord};
    use serde_json::json;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  Tech ")), Some("Tech"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_summarize_event() {
        let event = EventRecord::from_document(&Document::from_json(
            "a",
            json!({
                "name": "Jazz Night",
                "category": "Music",
                "date": "2025-07-20 19:00",
                "isRSVPed": true,
            }),
        ));
        assert_eq!(
            summarize_event(&event),
            "[x] Jazz Night (Music) | 2025-07-20 19:00 | id=a"
        );
    }

    #[test]
    fn test_summarize_event_omits_blank_fields() {
        let event = EventRecord::from_document(&Document::from_json(
            "b",
            json!({ "category": "", "location": " " }),
        ));
        assert_eq!(summarize_event(&event), "[ ] Untitled event | id=b");
    }
}

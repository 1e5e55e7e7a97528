use chrono::{SecondsFormat, Utc};

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Events delivered to watch subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A file was written. Carries the relative path exactly as it was requested.
    File { path: String },
    /// Keep-alive carrying the send time (RFC 3339, millisecond precision, UTC).
    Ping { timestamp: String },
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::File { .. } => "file",
            Event::Ping { .. } => "ping",
        }
    }
}

impl Event {
    pub fn file(path: impl Into<String>) -> Self {
        Event::File { path: path.into() }
    }

    pub fn ping() -> Self {
        Event::Ping {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn data(&self) -> &str {
        match self {
            Event::File { path } => path,
            Event::Ping { timestamp } => timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_event_carries_path_unchanged() {
        let event = Event::file("notes/with space.md");
        assert_eq!(event.event_type(), "file");
        assert_eq!(event.data(), "notes/with space.md");
    }

    #[test]
    fn ping_event_carries_utc_timestamp() {
        let event = Event::ping();

        assert_eq!(event.event_type(), "ping");
        assert!(event.data().ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(event.data()).is_ok());
    }
}

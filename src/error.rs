use crate::models::Notice;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Update error: {0}")]
    Update(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Calendar unavailable: {0}")]
    CalendarUnavailable(String),

    #[error("Calendar entry creation failed: {0}")]
    Creation(String),

    #[error("Invalid event date: {0}")]
    InvalidDate(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn subscription<S: Into<String>>(msg: S) -> Self {
        Self::Subscription(msg.into())
    }

    pub fn update<S: Into<String>>(msg: S) -> Self {
        Self::Update(msg.into())
    }

    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn calendar_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::CalendarUnavailable(msg.into())
    }

    pub fn creation<S: Into<String>>(msg: S) -> Self {
        Self::Creation(msg.into())
    }

    pub fn invalid_date<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDate(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_pii_safe(&self) -> bool {
        match self {
            Self::Network(_) | Self::Json(_) | Self::Io(_) => false,
            Self::Subscription(_)
            | Self::Update(_)
            | Self::PermissionDenied(_)
            | Self::CalendarUnavailable(_)
            | Self::Creation(_)
            | Self::InvalidDate(_)
            | Self::Config(_)
            | Self::InvalidInput(_) => true,
        }
    }

    /// This error as a subscription failure. A subscription error keeps its
    /// message; anything else is reduced to its safe string.
    pub fn to_subscription(&self) -> Self {
        match self {
            Self::Subscription(message) => Self::Subscription(message.clone()),
            other => Self::Subscription(other.to_safe_string()),
        }
    }

    pub fn to_safe_string(&self) -> String {
        if self.is_pii_safe() {
            self.to_string()
        } else {
            match self {
                Self::Network(_) => "Network request failed".to_string(),
                Self::Json(_) => "Unexpected response from the event store".to_string(),
                Self::Io(_) => "Device storage operation failed".to_string(),
                _ => self.to_string(),
            }
        }
    }

    /// The alert shown to the user when this error ends an operation.
    pub fn notice(&self) -> Notice {
        match self {
            Self::Subscription(_) => Notice::new(
                "Real-time Error",
                "Failed to get real-time event updates.",
            ),
            Self::Update(_) => Notice::new("Error", "Failed to update RSVP status."),
            Self::PermissionDenied(_) => Notice::new(
                "Permission required",
                "We need calendar permissions to save the event.",
            ),
            Self::CalendarUnavailable(_) => {
                Notice::new("Error", "No writable calendar found on this device.")
            }
            Self::Creation(_) => Notice::new(
                "Error",
                "Failed to save event to calendar. Please try again.",
            ),
            Self::InvalidDate(_) => Notice::new(
                "Error",
                "This event has no valid date and cannot be saved to your calendar.",
            ),
            other => Notice::new("Error", other.to_safe_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_string_hides_transport_details() {
        let err = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "/home/me/secret"));
        assert!(!err.is_pii_safe());
        assert_eq!(err.to_safe_string(), "Device storage operation failed");

        let err = AppError::update("document events/abc not found");
        assert!(err.is_pii_safe());
        assert!(err.to_safe_string().contains("events/abc"));
    }

    #[test]
    fn test_subscription_errors_are_not_rewrapped() {
        let err = AppError::subscription("HTTP 403 Forbidden").to_subscription();
        assert_eq!(err.to_string(), "Subscription error: HTTP 403 Forbidden");

        let err = AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")).to_subscription();
        assert_eq!(err.to_string(), "Subscription error: Device storage operation failed");
    }

    #[test]
    fn test_notice_titles_follow_error_kind() {
        assert_eq!(AppError::subscription("x").notice().title, "Real-time Error");
        assert_eq!(
            AppError::permission_denied("x").notice().title,
            "Permission required"
        );
        assert_eq!(
            AppError::calendar_unavailable("x").notice().message,
            "No writable calendar found on this device."
        );
        assert_eq!(AppError::config("x").notice().title, "Error");
    }
}

use chrono::{NaiveDateTime, Timelike};

/// Default label appended after the time.
pub const DEFAULT_ZONE_SUFFIX: &str = "UTC+8";

/// Renders the profile last name, e.g. `09:05 UTC+8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFormat {
    suffix: String,
}

impl NameFormat {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into().trim().to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn render(&self, now: NaiveDateTime) -> String {
        if self.suffix.is_empty() {
            format!("{:02}:{:02}", now.hour(), now.minute())
        } else {
            format!("{:02}:{:02} {}", now.hour(), now.minute(), self.suffix)
        }
    }
}

impl Default for NameFormat {
    fn default() -> Self {
        Self::new(DEFAULT_ZONE_SUFFIX)
    }
}

//! Profile Button Entity
//!
//! One action button on a profile page. Buttons of a profile form an ordered
//! list ranked by `position`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::Entity;
use super::error::{SyncError, SyncResult};

/// Prefix for review links generated from a place identifier
pub const GOOGLE_REVIEW_URL: &str = "https://search.google.com/local/writereview?placeid=";

/// Action kind determines how `action_value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Opens a URL
    #[default]
    Link,
    /// Opens the mail client
    Email,
    /// Dials a phone number
    Call,
    /// Opens the review page of a place
    GoogleReview,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Link => "link",
            ActionKind::Email => "email",
            ActionKind::Call => "call",
            ActionKind::GoogleReview => "google_review",
        }
    }

    /// Normalize a raw form value for this kind.
    ///
    /// Links get an `https://` scheme when none is present, review buttons
    /// accept a bare place identifier and turn it into the review URL.
    pub fn normalize_value(&self, raw: &str) -> String {
        let value = raw.trim();
        if value.is_empty() {
            return String::new();
        }
        match self {
            ActionKind::Link => {
                if has_http_scheme(value) {
                    value.to_string()
                } else {
                    format!("https://{}", value)
                }
            }
            ActionKind::GoogleReview => {
                if has_http_scheme(value) {
                    value.to_string()
                } else {
                    format!("{}{}", GOOGLE_REVIEW_URL, value)
                }
            }
            ActionKind::Email | ActionKind::Call => value.to_string(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(ActionKind::Link),
            "email" => Ok(ActionKind::Email),
            "call" => Ok(ActionKind::Call),
            "google_review" => Ok(ActionKind::GoogleReview),
            other => Err(SyncError::InvalidInput(format!("unknown action type '{}'", other))),
        }
    }
}

fn has_http_scheme(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// A button as submitted by the button form, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewButton {
    pub label: String,
    pub action_kind: ActionKind,
    pub action_value: String,
}

impl NewButton {
    pub fn new(label: impl Into<String>, action_kind: ActionKind, action_value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action_kind,
            action_value: action_value.into(),
        }
    }

    /// Trim the label, normalize the value and reject empty fields
    pub fn normalized(self) -> SyncResult<Self> {
        let label = self.label.trim().to_string();
        if label.is_empty() {
            return Err(SyncError::InvalidInput("button label must not be empty".to_string()));
        }
        let action_value = self.action_kind.normalize_value(&self.action_value);
        if action_value.is_empty() {
            return Err(SyncError::InvalidInput(format!(
                "a {} button needs a value",
                self.action_kind
            )));
        }
        Ok(Self {
            label,
            action_kind: self.action_kind,
            action_value,
        })
    }
}

/// A profile action button as stored in `profile_buttons`
///
/// Serde names follow the table columns so rows map onto the struct directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileButton {
    /// Unique identifier, assigned by the store (empty until created)
    pub id: String,
    /// Owning profile
    #[serde(rename = "profile_id")]
    pub parent_id: String,
    /// Display text
    pub label: String,
    #[serde(rename = "action_type")]
    pub action_kind: ActionKind,
    pub action_value: String,
    /// Zero-based rank within the profile
    #[serde(rename = "sort_order")]
    pub position: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ProfileButton {
    /// A button that has not been persisted yet; the store fills in the id
    pub fn draft(parent_id: impl Into<String>, button: NewButton, position: i32) -> Self {
        Self {
            id: String::new(),
            parent_id: parent_id.into(),
            label: button.label,
            action_kind: button.action_kind,
            action_value: button.action_value,
            position,
            created_at: None,
        }
    }

    /// Whether the store has assigned an id yet
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// What a client opens when the button is pressed
    pub fn action_target(&self) -> String {
        match self.action_kind {
            ActionKind::Link | ActionKind::GoogleReview => self.action_value.clone(),
            ActionKind::Email => format!("mailto:{}", self.action_value),
            ActionKind::Call => format!("tel:{}", self.action_value),
        }
    }
}

impl Entity for ProfileButton {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A recorded press of a public profile button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonClick {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub button_id: String,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ButtonClick {
    pub fn for_button(button: &ProfileButton) -> Self {
        Self {
            id: None,
            button_id: button.id.clone(),
            profile_id: button.parent_id.clone(),
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_gets_https_scheme() {
        assert_eq!(ActionKind::Link.normalize_value(" example.com "), "https://example.com");
        assert_eq!(ActionKind::Link.normalize_value("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_review_place_id_becomes_url() {
        assert_eq!(
            ActionKind::GoogleReview.normalize_value("ChIJ123"),
            "https://search.google.com/local/writereview?placeid=ChIJ123"
        );
        let url = "https://search.google.com/local/writereview?placeid=abc";
        assert_eq!(ActionKind::GoogleReview.normalize_value(url), url);
    }

    #[test]
    fn test_email_and_call_are_only_trimmed() {
        assert_eq!(ActionKind::Email.normalize_value(" a@b.co "), "a@b.co");
        assert_eq!(ActionKind::Call.normalize_value("+1 555 0100"), "+1 555 0100");
    }

    #[test]
    fn test_new_button_rejects_empty_fields() {
        let empty_label = NewButton::new("   ", ActionKind::Link, "example.com").normalized();
        assert!(matches!(empty_label, Err(SyncError::InvalidInput(_))));

        let empty_value = NewButton::new("Site", ActionKind::Call, "  ").normalized();
        assert!(matches!(empty_value, Err(SyncError::InvalidInput(_))));
    }

    #[test]
    fn test_action_target() {
        let mut button = ProfileButton::draft(
            "p1",
            NewButton::new("Mail", ActionKind::Email, "me@example.com"),
            0,
        );
        assert_eq!(button.action_target(), "mailto:me@example.com");

        button.action_kind = ActionKind::Call;
        button.action_value = "+15550100".to_string();
        assert_eq!(button.action_target(), "tel:+15550100");
    }

    #[test]
    fn test_action_kind_parsing() {
        assert_eq!("google_review".parse::<ActionKind>().unwrap(), ActionKind::GoogleReview);
        assert!("fax".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_serializes_with_column_names() {
        let button = ProfileButton::draft("p1", NewButton::new("Site", ActionKind::Link, "https://x.io"), 3);
        let value = serde_json::to_value(&button).unwrap();
        assert_eq!(value["profile_id"], "p1");
        assert_eq!(value["action_type"], "link");
        assert_eq!(value["sort_order"], 3);
        assert!(value.get("created_at").is_none());
    }
}

//! Push notifications raised by the worker.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::PortalConfig;

/// Action id that opens the portal when clicked.
pub const EXPLORE_ACTION: &str = "explore";
/// Action id that only dismisses the notification.
pub const CLOSE_ACTION: &str = "close";

/// A button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Data attached to every notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch when the push arrived.
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

/// A notification ready to be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds, alternating on and off.
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// Fixed branding applied to every push.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub title: String,
    pub icon: String,
    pub badge: String,
    /// Body used when the push carries no payload.
    pub default_body: String,
}

impl NotificationTemplate {
    /// Builds the template from the portal's branding.
    #[must_use]
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            title: config.brand.clone(),
            icon: config.notification_icon.clone(),
            badge: config.notification_icon.clone(),
            default_body: format!("New update from {}", config.brand),
        }
    }

    /// Renders a notification for a push with an optional text payload.
    #[must_use]
    pub fn render(&self, payload: Option<&str>) -> Notification {
        let action = |id: &str, title: &str| NotificationAction {
            action: id.to_string(),
            title: title.to_string(),
            icon: self.icon.clone(),
        };

        Notification {
            title: self.title.clone(),
            body: payload.map_or_else(|| self.default_body.clone(), ToString::to_string),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibrate: vec![100, 50, 100],
            data: NotificationData {
                date_of_arrival: Utc::now().timestamp_millis(),
                primary_key: 1,
            },
            actions: vec![action(EXPLORE_ACTION, "Explore"), action(CLOSE_ACTION, "Close")],
        }
    }
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

/// What the host should do after a notification click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    /// The notification is always closed.
    pub close: bool,
    /// Page to open in a new browsing context, if any.
    pub open_window: Option<String>,
}

/// Handles a click on a notification or one of its actions.
///
/// Every click closes the notification; only [`EXPLORE_ACTION`] opens the root page.
#[must_use]
pub fn on_click(action: Option<&str>) -> ClickOutcome {
    ClickOutcome {
        close: true,
        open_window: (action == Some(EXPLORE_ACTION)).then(|| "/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_becomes_body() {
        let n = NotificationTemplate::default().render(Some("Harrier test drive confirmed"));
        assert_eq!(n.title, "Tata Motors");
        assert_eq!(n.body, "Harrier test drive confirmed");
        assert_eq!(n.vibrate, vec![100, 50, 100]);
        assert_eq!(n.data.primary_key, 1);
        assert!(n.data.date_of_arrival > 0);
        assert_eq!(n.icon, n.badge);
    }

    #[test]
    fn empty_push_uses_default_body() {
        let n = NotificationTemplate::default().render(None);
        assert_eq!(n.body, "New update from Tata Motors");
    }

    #[test]
    fn has_explore_and_close_actions() {
        let n = NotificationTemplate::default().render(None);
        let ids: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(ids, vec![EXPLORE_ACTION, CLOSE_ACTION]);
    }

    #[test]
    fn explore_opens_root() {
        assert_eq!(
            on_click(Some(EXPLORE_ACTION)),
            ClickOutcome {
                close: true,
                open_window: Some("/".into())
            }
        );
        assert_eq!(on_click(Some(CLOSE_ACTION)).open_window, None);
        assert_eq!(on_click(None).open_window, None);
        assert!(on_click(None).close);
    }

    #[test]
    fn data_serializes_camel_case() {
        let json = serde_json::to_value(NotificationTemplate::default().render(None)).unwrap();
        assert!(json["data"]["dateOfArrival"].is_i64());
        assert_eq!(json["data"]["primaryKey"], 1);
    }
}

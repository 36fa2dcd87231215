//! Callback scheduling: pick a day, pick a slot, confirm.

use serde::{Deserialize, Serialize};

use super::lead::{ActionAck, CALLBACK_REQUEST, LeadService, UserAction};
use crate::error::{Error, Result};

/// A chosen callback day and time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSelection {
    pub day: String,
    pub slot: String,
}

/// Which view of the callback dialog is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "view", rename_all = "kebab-case")]
pub enum CallbackFlow {
    #[default]
    DaySelection,
    SlotSelection { day: String },
    Confirmation(CallbackSelection),
}

fn non_blank(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("callback {field} must not be empty")));
    }
    Ok(value.to_string())
}

impl CallbackFlow {
    /// Starts a new flow at day selection.
    #[must_use]
    pub const fn new() -> Self {
        Self::DaySelection
    }

    /// Records the day and moves on to slot selection. Picking a day again
    /// from slot selection replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the day is blank or the flow is already confirmed.
    pub fn choose_day(&mut self, day: &str) -> Result<()> {
        if matches!(self, Self::Confirmation(_)) {
            return Err(Error::InvalidInput("callback already confirmed".into()));
        }
        *self = Self::SlotSelection {
            day: non_blank("day", day)?,
        };
        Ok(())
    }

    /// Records the slot and posts the `callback_request` action. The flow
    /// moves to confirmation once the action is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if no day has been chosen, the slot is blank, or the
    /// action cannot be posted. The flow stays at slot selection then.
    pub async fn choose_slot(&mut self, slot: &str, service: &dyn LeadService) -> Result<ActionAck> {
        let Self::SlotSelection { day } = self else {
            return Err(Error::InvalidInput("choose a callback day first".into()));
        };
        let selection = CallbackSelection {
            day: day.clone(),
            slot: non_blank("slot", slot)?,
        };

        let ack = service
            .post_action(&UserAction::new(
                CALLBACK_REQUEST,
                Some(serde_json::to_value(&selection)?),
            ))
            .await?;
        log::info!("Callback requested for {} {}", selection.day, selection.slot);
        *self = Self::Confirmation(selection);
        Ok(ack)
    }

    /// The confirmed selection, if the flow has finished.
    #[must_use]
    pub const fn confirmed(&self) -> Option<&CallbackSelection> {
        match self {
            Self::Confirmation(selection) => Some(selection),
            _ => None,
        }
    }
}

/// Runs the whole flow in one step.
///
/// # Errors
///
/// See [`CallbackFlow::choose_day`] and [`CallbackFlow::choose_slot`].
pub async fn request_callback(
    day: &str,
    slot: &str,
    service: &dyn LeadService,
) -> Result<CallbackSelection> {
    let mut flow = CallbackFlow::new();
    flow.choose_day(day)?;
    flow.choose_slot(slot, service).await?;
    match flow {
        CallbackFlow::Confirmation(selection) => Ok(selection),
        _ => Err(Error::InvalidInput("callback was not confirmed".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::lead::Lead;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        actions: Mutex<Vec<UserAction>>,
        fail: bool,
    }

    #[async_trait]
    impl LeadService for Recorder {
        async fn fetch_lead(&self, lead_id: &str) -> Result<Lead> {
            Ok(Lead {
                lead_name: "Test".into(),
                executive_phone_number: "0".into(),
                lead_id: lead_id.into(),
            })
        }

        async fn post_action(&self, action: &UserAction) -> Result<ActionAck> {
            if self.fail {
                return Err(Error::Network("offline".into()));
            }
            self.actions.lock().unwrap().push(action.clone());
            Ok(ActionAck { success: true })
        }
    }

    #[tokio::test]
    async fn confirming_posts_selection() {
        let service = Recorder::default();
        let mut flow = CallbackFlow::new();
        assert_eq!(flow, CallbackFlow::DaySelection);

        flow.choose_day("tomorrow").unwrap();
        assert_eq!(
            flow,
            CallbackFlow::SlotSelection {
                day: "tomorrow".into()
            }
        );

        let ack = flow.choose_slot("10am-12pm", &service).await.unwrap();
        assert!(ack.success);
        assert_eq!(flow.confirmed().unwrap().slot, "10am-12pm");

        let actions = service.actions.lock().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, CALLBACK_REQUEST);
        assert_eq!(
            actions[0].data,
            Some(serde_json::json!({"day": "tomorrow", "slot": "10am-12pm"}))
        );
    }

    #[tokio::test]
    async fn slot_before_day_is_rejected() {
        let service = Recorder::default();
        let mut flow = CallbackFlow::new();
        assert!(flow.choose_slot("morning", &service).await.is_err());
        assert!(service.actions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_post_stays_at_slot_selection() {
        let service = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut flow = CallbackFlow::new();
        flow.choose_day("today").unwrap();
        assert!(flow.choose_slot("evening", &service).await.is_err());
        assert!(matches!(flow, CallbackFlow::SlotSelection { .. }));
        assert!(flow.confirmed().is_none());
    }

    #[test]
    fn blank_day_and_rechoosing() {
        let mut flow = CallbackFlow::new();
        assert!(flow.choose_day("  ").is_err());
        flow.choose_day("today").unwrap();
        flow.choose_day("tomorrow").unwrap();
        assert_eq!(
            flow,
            CallbackFlow::SlotSelection {
                day: "tomorrow".into()
            }
        );
    }

    #[tokio::test]
    async fn one_step_request() {
        let service = Recorder::default();
        let selection = request_callback("today", "afternoon", &service).await.unwrap();
        assert_eq!(selection.day, "today");
        assert!(request_callback("", "afternoon", &service).await.is_err());
    }

    #[test]
    fn flow_serializes_view_tag() {
        let json = serde_json::to_value(CallbackFlow::SlotSelection { day: "today".into() }).unwrap();
        assert_eq!(json["view"], "slot-selection");
        assert_eq!(json["day"], "today");
    }
}

//! Lead lookup and action logging.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PortalConfig;
use crate::error::Result;

/// Lead shown when the page URL carries no `leadId`.
pub const DEFAULT_LEAD_ID: &str = "LEAD_001";

/// Action posted when the customer books a test drive.
pub const TEST_DRIVE_REQUEST: &str = "test_drive_request";
/// Action posted when the customer confirms a callback slot.
pub const CALLBACK_REQUEST: &str = "callback_request";

/// Customer and advisor details for one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub lead_name: String,
    pub executive_phone_number: String,
    pub lead_id: String,
}

impl Lead {
    /// `tel:` link for the advisor's phone.
    #[must_use]
    pub fn advisor_link(&self) -> String {
        let digits: String = self
            .executive_phone_number
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        format!("tel:{digits}")
    }
}

fn new_action_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Something the customer did on the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    #[serde(default = "new_action_id")]
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl UserAction {
    #[must_use]
    pub fn new(action: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            id: new_action_id(),
            action: action.to_string(),
            data,
        }
    }
}

/// Acknowledgement of a posted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAck {
    pub success: bool,
}

/// Backend for lead data and the action log.
#[async_trait]
pub trait LeadService: Send + Sync {
    /// Looks up the lead.
    async fn fetch_lead(&self, lead_id: &str) -> Result<Lead>;

    /// Records a customer action.
    async fn post_action(&self, action: &UserAction) -> Result<ActionAck>;
}

/// Extracts `leadId` from a query string, defaulting to [`DEFAULT_LEAD_ID`].
#[must_use]
pub fn lead_id_from_query(query: Option<&str>) -> String {
    query
        .into_iter()
        .flat_map(|q| url::form_urlencoded::parse(q.as_bytes()))
        .find(|(k, _)| k == "leadId")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_LEAD_ID.to_string())
}

/// Answers with fixed data after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedLeadService {
    lead_delay: Duration,
    action_delay: Duration,
}

impl SimulatedLeadService {
    #[must_use]
    pub const fn new(lead_delay: Duration, action_delay: Duration) -> Self {
        Self {
            lead_delay,
            action_delay,
        }
    }

    #[must_use]
    pub const fn from_config(config: &PortalConfig) -> Self {
        Self::new(
            Duration::from_millis(config.lead_delay_ms),
            Duration::from_millis(config.action_delay_ms),
        )
    }
}

impl Default for SimulatedLeadService {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

#[async_trait]
impl LeadService for SimulatedLeadService {
    async fn fetch_lead(&self, lead_id: &str) -> Result<Lead> {
        tokio::time::sleep(self.lead_delay).await;
        Ok(Lead {
            lead_name: "Priya".to_string(),
            executive_phone_number: "+91 98765 43210".to_string(),
            lead_id: lead_id.to_string(),
        })
    }

    async fn post_action(&self, action: &UserAction) -> Result<ActionAck> {
        tokio::time::sleep(self.action_delay).await;
        log::info!("Action posted: {} {:?}", action.action, action.data);
        Ok(ActionAck { success: true })
    }
}

/// Calls remote lead and action endpoints.
#[derive(Debug, Clone)]
pub struct HttpLeadService {
    client: reqwest::Client,
    lead_endpoint: Url,
    action_endpoint: Url,
}

impl HttpLeadService {
    #[must_use]
    pub const fn new(client: reqwest::Client, lead_endpoint: Url, action_endpoint: Url) -> Self {
        Self {
            client,
            lead_endpoint,
            action_endpoint,
        }
    }
}

#[async_trait]
impl LeadService for HttpLeadService {
    async fn fetch_lead(&self, lead_id: &str) -> Result<Lead> {
        let lead = self
            .client
            .get(self.lead_endpoint.clone())
            .query(&[("leadId", lead_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(lead)
    }

    async fn post_action(&self, action: &UserAction) -> Result<ActionAck> {
        let ack = self
            .client
            .post(self.action_endpoint.clone())
            .json(action)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ack)
    }
}

/// Picks the HTTP service when both endpoints are configured, the simulated
/// one otherwise.
///
/// # Errors
///
/// Returns an error if an endpoint is not a valid URL.
pub fn service_from_config(
    config: &PortalConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn LeadService>> {
    match (&config.lead_endpoint, &config.action_endpoint) {
        (Some(lead), Some(action)) => Ok(Arc::new(HttpLeadService::new(
            client,
            Url::parse(lead)?,
            Url::parse(action)?,
        ))),
        (None, None) => Ok(Arc::new(SimulatedLeadService::from_config(config))),
        _ => {
            log::warn!("Only one portal endpoint configured; using simulated services");
            Ok(Arc::new(SimulatedLeadService::from_config(config)))
        }
    }
}

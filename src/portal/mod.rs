//! Page-controller services behind the portal's single screen: lead
//! greeting, action logging, the assistant chat, offers and callbacks.

mod callback;
mod chat;
mod lead;
mod offers;

pub use callback::{CallbackFlow, CallbackSelection, request_callback};
pub use chat::ChatRules;
pub use lead::{
    ActionAck, CALLBACK_REQUEST, DEFAULT_LEAD_ID, HttpLeadService, Lead, LeadService,
    SimulatedLeadService, TEST_DRIVE_REQUEST, UserAction, lead_id_from_query,
    service_from_config,
};
pub use offers::{Offer, default_offers};

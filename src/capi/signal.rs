//! Raw, untrusted input collected from a browser session.
//!
//! A `UserSignal` is the flat JSON body the generated GTM scripts (or any
//! other caller) POST to a relay endpoint. It is assembled at the moment a
//! tracked user action fires, transformed into exactly one `CapiEvent`,
//! and discarded — never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::Content;

/// Every field is optional; the builder degrades by omission.
///
/// Identity fields use the short keys the original DataLayer contract
/// uses on the wire (`fn`, `ln`, `ge`, `db`, `ct`, `st`, `zp`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSignal {
    /// GTM container the event belongs to; selects the Facebook token.
    pub gtm_container_id: Option<String>,
    /// The triggering page URL. Canonicalized before it is sent on.
    pub event_source_url: Option<String>,
    /// Caller-supplied de-duplication key.
    pub event_id: Option<String>,
    /// Routes the event to Meta's test environment when set.
    pub test_event_code: Option<String>,

    // Identity fields — hashed before leaving the relay.
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "fn")]
    pub first_name: Option<String>,
    #[serde(rename = "ln")]
    pub last_name: Option<String>,
    #[serde(rename = "ge")]
    pub gender: Option<String>,
    #[serde(rename = "db")]
    pub birth_date: Option<String>,
    #[serde(rename = "ct")]
    pub city: Option<String>,
    #[serde(rename = "st")]
    pub state: Option<String>,
    #[serde(rename = "zp")]
    pub zip: Option<String>,
    pub country: Option<String>,
    pub external_id: Option<String>,

    // Pass-through fields — never hashed, never trimmed.
    pub client_ip_address: Option<String>,
    pub client_user_agent: Option<String>,
    pub fbc: Option<String>,
    pub fbp: Option<String>,

    // Commerce / event-specific fields. Which of these reach the payload
    // is decided per event kind by the builder's field table.
    pub value: Option<Value>,
    pub currency: Option<String>,
    pub content_ids: Option<Vec<String>>,
    pub contents: Option<Vec<Content>>,
    pub order_id: Option<String>,
    pub search_string: Option<String>,
    pub registration_method: Option<String>,
    pub form_id: Option<String>,
    pub lead_type: Option<String>,
    pub contact_method: Option<String>,
    pub predicted_ltv: Option<Value>,
    pub delivery_category: Option<String>,
}

//! Wire types for Meta Conversions API events.
//!
//! `CapiEvent` is the exact JSON object posted (wrapped in an
//! `EventsEnvelope`) to the Graph API `/{pixel_id}/events` endpoint.
//! Optional fields are omitted from the serialized payload, never sent
//! as `null` — the same convention `user_data` follows for hashes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Event kinds ──────────────────────────────────────────────────────────────

/// The closed set of event kinds the relay accepts.
///
/// The serialized name is the Meta standard-event name; `route_name`
/// gives the kebab-case path segment of the relay endpoint
/// (`POST /api/v1/events/{route_name}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    PageView,
    ViewContent,
    AddToCart,
    AddToWishlist,
    InitiateCheckout,
    AddPaymentInfo,
    Purchase,
    Lead,
    CompleteRegistration,
    Contact,
    CustomizeProduct,
    Donate,
    FindLocation,
    Schedule,
    Search,
    StartTrial,
    SubmitApplication,
    Subscribe,
    CustomEvent,
}

impl EventName {
    pub const ALL: [EventName; 19] = [
        EventName::PageView,
        EventName::ViewContent,
        EventName::AddToCart,
        EventName::AddToWishlist,
        EventName::InitiateCheckout,
        EventName::AddPaymentInfo,
        EventName::Purchase,
        EventName::Lead,
        EventName::CompleteRegistration,
        EventName::Contact,
        EventName::CustomizeProduct,
        EventName::Donate,
        EventName::FindLocation,
        EventName::Schedule,
        EventName::Search,
        EventName::StartTrial,
        EventName::SubmitApplication,
        EventName::Subscribe,
        EventName::CustomEvent,
    ];

    /// Meta standard-event name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::PageView => "PageView",
            EventName::ViewContent => "ViewContent",
            EventName::AddToCart => "AddToCart",
            EventName::AddToWishlist => "AddToWishlist",
            EventName::InitiateCheckout => "InitiateCheckout",
            EventName::AddPaymentInfo => "AddPaymentInfo",
            EventName::Purchase => "Purchase",
            EventName::Lead => "Lead",
            EventName::CompleteRegistration => "CompleteRegistration",
            EventName::Contact => "Contact",
            EventName::CustomizeProduct => "CustomizeProduct",
            EventName::Donate => "Donate",
            EventName::FindLocation => "FindLocation",
            EventName::Schedule => "Schedule",
            EventName::Search => "Search",
            EventName::StartTrial => "StartTrial",
            EventName::SubmitApplication => "SubmitApplication",
            EventName::Subscribe => "Subscribe",
            EventName::CustomEvent => "CustomEvent",
        }
    }

    /// Kebab-case path segment of the relay endpoint.
    pub fn route_name(&self) -> &'static str {
        match self {
            EventName::PageView => "page-view",
            EventName::ViewContent => "view-content",
            EventName::AddToCart => "add-to-cart",
            EventName::AddToWishlist => "add-to-wishlist",
            EventName::InitiateCheckout => "initiate-checkout",
            EventName::AddPaymentInfo => "add-payment-info",
            EventName::Purchase => "purchase",
            EventName::Lead => "lead",
            EventName::CompleteRegistration => "complete-registration",
            EventName::Contact => "contact",
            EventName::CustomizeProduct => "customize-product",
            EventName::Donate => "donate",
            EventName::FindLocation => "find-location",
            EventName::Schedule => "schedule",
            EventName::Search => "search",
            EventName::StartTrial => "start-trial",
            EventName::SubmitApplication => "submit-application",
            EventName::Subscribe => "subscribe",
            EventName::CustomEvent => "custom-event",
        }
    }

    /// Resolve a kebab-case route segment back to an event kind.
    pub fn from_route(segment: &str) -> Option<EventName> {
        EventName::ALL
            .iter()
            .copied()
            .find(|name| name.route_name() == segment)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payload structs ──────────────────────────────────────────────────────────

/// Hashed identity fields plus unhashed browser identifiers.
///
/// Hashed keys carry one-element arrays of lowercase hex SHA-256 digests
/// (Meta's multi-value convention). A field missing from the source signal,
/// or empty after normalization, is absent here — not an empty array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<Vec<String>>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Vec<String>>,
    #[serde(rename = "ln", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Vec<String>>,
    #[serde(rename = "ge", skip_serializing_if = "Option::is_none")]
    pub gender: Option<Vec<String>>,
    #[serde(rename = "db", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<Vec<String>>,
    #[serde(rename = "ct", skip_serializing_if = "Option::is_none")]
    pub city: Option<Vec<String>>,
    #[serde(rename = "st", skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<String>>,
    #[serde(rename = "zp", skip_serializing_if = "Option::is_none")]
    pub zip: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Vec<String>>,

    // Pass-through fields — sent unhashed, only when non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
}

/// One line item in `custom_data.contents`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_price: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_category: Option<String>,
}

/// Event-kind-specific commerce/custom attributes.
///
/// Which fields may appear is decided by the builder's per-event field
/// table; a field irrelevant to the event kind is never serialized even
/// when the source signal carried it. `value` and `predicted_ltv` keep
/// the caller's JSON number representation untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Content>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_ltv: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_category: Option<String>,
}

/// One event as posted to Meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapiEvent {
    pub event_name: String,
    /// Unix seconds, captured at dispatch time — not page load.
    pub event_time: i64,
    /// De-duplication key. The relay stamps a UUIDv4 when the signal
    /// carries none, so rapid duplicate triggers stay distinguishable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub action_source: String,
    pub event_source_url: String,
    pub user_data: UserData,
    pub custom_data: CustomData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<String>,
}

/// Top-level body of the Graph API POST: `{data: [event], access_token}`.
#[derive(Debug, Clone, Serialize)]
pub struct EventsEnvelope<'a> {
    pub data: [&'a CapiEvent; 1],
    pub access_token: &'a str,
}

/// Response body from the Graph API events endpoint.
///
/// Meta returns at least `events_received` and `fbtrace_id`; anything
/// else is kept verbatim in `extra` so the relay can pass the response
/// through to its own caller unmodified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_received: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbtrace_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

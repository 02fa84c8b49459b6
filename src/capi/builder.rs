//! The event payload builder.
//!
//! Pure transformation of a [`UserSignal`] into a [`CapiEvent`]: identity
//! fields are normalized and hashed, pass-through fields copied verbatim,
//! and the event kind selects which commerce fields survive into
//! `custom_data` via a single field table (the original shipped 19
//! near-identical per-event builders; one table replaces them all).
//!
//! No I/O and no clock access — `event_time` is injected by the caller,
//! so two calls with the same signal and timestamp produce byte-identical
//! payloads.

use url::Url;

use super::event::{CapiEvent, CustomData, EventName, UserData};
use super::hashing::{hash_identity_field, Normalization};
use super::signal::UserSignal;

pub const ACTION_SOURCE: &str = "website";

// ─── user_data ────────────────────────────────────────────────────────────────

/// Hash the 11 identity fields and copy the 4 pass-through fields.
///
/// Fields that are absent, or empty after normalization, are omitted —
/// a hash of the empty string never reaches the wire.
pub fn build_user_data(signal: &UserSignal) -> UserData {
    let hashed = |norm: Normalization, value: &Option<String>| -> Option<Vec<String>> {
        value
            .as_deref()
            .and_then(|raw| hash_identity_field(norm, raw))
            .map(|digest| vec![digest])
    };
    let passthrough = |value: &Option<String>| -> Option<String> {
        value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
    };

    UserData {
        em: hashed(Normalization::LowercaseTrim, &signal.email),
        ph: hashed(Normalization::DigitsOnly, &signal.phone),
        first_name: hashed(Normalization::LowercaseTrim, &signal.first_name),
        last_name: hashed(Normalization::LowercaseTrim, &signal.last_name),
        gender: hashed(Normalization::LowercaseTrim, &signal.gender),
        birth_date: hashed(Normalization::AsIs, &signal.birth_date),
        city: hashed(Normalization::LowercaseTrim, &signal.city),
        state: hashed(Normalization::LowercaseTrim, &signal.state),
        zip: hashed(Normalization::AsIs, &signal.zip),
        country: hashed(Normalization::LowercaseTrim, &signal.country),
        external_id: hashed(Normalization::AsIs, &signal.external_id),
        client_ip_address: passthrough(&signal.client_ip_address),
        client_user_agent: passthrough(&signal.client_user_agent),
        fbc: passthrough(&signal.fbc),
        fbp: passthrough(&signal.fbp),
    }
}

// ─── custom_data ──────────────────────────────────────────────────────────────

/// Commerce/custom fields that can appear in `custom_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomField {
    Value,
    Currency,
    ContentIds,
    Contents,
    OrderId,
    SearchString,
    RegistrationMethod,
    FormId,
    LeadType,
    ContactMethod,
    PredictedLtv,
    DeliveryCategory,
}

use CustomField::*;

/// Which custom fields each event kind carries. Kinds not listed here
/// (PageView, CustomEvent) send an empty `custom_data`.
fn custom_fields(name: EventName) -> &'static [CustomField] {
    match name {
        EventName::Purchase => &[Value, Currency, ContentIds, Contents, OrderId],
        EventName::AddToCart | EventName::InitiateCheckout => {
            &[Value, Currency, ContentIds, Contents]
        }
        EventName::ViewContent | EventName::AddPaymentInfo | EventName::SubmitApplication => {
            &[Value, Currency, ContentIds, Contents]
        }
        EventName::AddToWishlist | EventName::CustomizeProduct => &[ContentIds, Contents],
        EventName::Lead => &[FormId, LeadType],
        EventName::Contact => &[ContactMethod],
        EventName::Search => &[SearchString],
        EventName::Donate => &[Value, Currency],
        EventName::CompleteRegistration => &[RegistrationMethod],
        EventName::Subscribe | EventName::StartTrial => &[Value, Currency, PredictedLtv],
        EventName::FindLocation => &[ContentIds, Contents, SearchString],
        EventName::Schedule => &[ContentIds, Contents, DeliveryCategory],
        EventName::PageView | EventName::CustomEvent => &[],
    }
}

/// Copy exactly the fields the event kind allows from the signal.
///
/// Fields the signal does not carry stay omitted (never `null`), and
/// fields outside the event's table are dropped even when present.
pub fn build_custom_data(name: EventName, signal: &UserSignal) -> CustomData {
    let mut data = CustomData::default();
    for field in custom_fields(name) {
        match field {
            Value => data.value = signal.value.clone(),
            Currency => data.currency = signal.currency.clone(),
            ContentIds => data.content_ids = signal.content_ids.clone(),
            Contents => data.contents = signal.contents.clone(),
            OrderId => data.order_id = signal.order_id.clone(),
            SearchString => data.search_string = signal.search_string.clone(),
            RegistrationMethod => data.registration_method = signal.registration_method.clone(),
            FormId => data.form_id = signal.form_id.clone(),
            LeadType => data.lead_type = signal.lead_type.clone(),
            ContactMethod => data.contact_method = signal.contact_method.clone(),
            PredictedLtv => data.predicted_ltv = signal.predicted_ltv.clone(),
            DeliveryCategory => data.delivery_category = signal.delivery_category.clone(),
        }
    }
    data
}

// ─── event_source_url ─────────────────────────────────────────────────────────

/// Prepend `www.` to the host of an absolute URL when it is missing.
///
/// Operates on the parsed host component, so a `://` elsewhere in the
/// URL (query strings, fragments) cannot corrupt it. Idempotent, and a
/// string that does not parse as an absolute URL passes through
/// unchanged.
pub fn canonicalize_source_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    match parsed.host_str() {
        Some(host) if !host.starts_with("www.") => {
            let prefixed = format!("www.{host}");
            if parsed.set_host(Some(&prefixed)).is_ok() {
                parsed.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

/// Assemble the full payload. Pure; cannot fail — missing input degrades
/// to omitted fields. `event_time` must be Unix seconds captured at the
/// moment of dispatch.
pub fn build_capi_event(name: EventName, signal: &UserSignal, event_time: i64) -> CapiEvent {
    let source_url = signal
        .event_source_url
        .as_deref()
        .map(canonicalize_source_url)
        .unwrap_or_default();
    let test_event_code = signal
        .test_event_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string);

    CapiEvent {
        event_name: name.as_str().to_string(),
        event_time,
        event_id: signal.event_id.clone(),
        action_source: ACTION_SOURCE.to_string(),
        event_source_url: source_url,
        user_data: build_user_data(signal),
        custom_data: build_custom_data(name, signal),
        test_event_code,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::hashing::hex_sha256;
    use serde_json::json;

    fn signal(json: serde_json::Value) -> UserSignal {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn empty_identity_fields_are_omitted() {
        let user_data = build_user_data(&signal(json!({
            "email": "  ",
            "phone": "",
            "fn": "\t",
            "country": "de"
        })));
        assert!(user_data.em.is_none());
        assert!(user_data.ph.is_none());
        assert!(user_data.first_name.is_none());
        assert_eq!(user_data.country, Some(vec![hex_sha256("de")]));
    }

    #[test]
    fn passthrough_fields_are_never_hashed() {
        let user_data = build_user_data(&signal(json!({
            "client_ip_address": "203.0.113.9",
            "client_user_agent": "Mozilla/5.0",
            "fbc": "fb.1.1700000000.AbCdEf",
            "fbp": ""
        })));
        assert_eq!(user_data.client_ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(user_data.client_user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(user_data.fbc.as_deref(), Some("fb.1.1700000000.AbCdEf"));
        assert!(user_data.fbp.is_none());
    }

    #[test]
    fn purchase_custom_data_has_exactly_its_table_fields() {
        let custom = build_custom_data(
            EventName::Purchase,
            &signal(json!({
                "value": 49.9,
                "currency": "EUR",
                "content_ids": ["p1", "p2"],
                "order_id": "ord-7",
                "search_string": "should not appear"
            })),
        );
        assert_eq!(
            serde_json::to_value(&custom).unwrap(),
            json!({
                "value": 49.9,
                "currency": "EUR",
                "content_ids": ["p1", "p2"],
                "order_id": "ord-7"
            })
        );
    }

    #[test]
    fn search_custom_data_is_only_the_search_string() {
        let custom = build_custom_data(
            EventName::Search,
            &signal(json!({
                "search_string": "red shoes",
                "value": 10,
                "content_ids": ["p1"]
            })),
        );
        assert_eq!(custom.search_string.as_deref(), Some("red shoes"));
        let map = serde_json::to_value(&custom).unwrap();
        assert_eq!(map.as_object().unwrap().len(), 1);
    }

    #[test]
    fn page_view_custom_data_is_empty() {
        let custom = build_custom_data(
            EventName::PageView,
            &signal(json!({"value": 5, "currency": "USD"})),
        );
        assert_eq!(serde_json::to_string(&custom).unwrap(), "{}");
    }

    #[test]
    fn canonicalize_inserts_www_into_host() {
        assert_eq!(
            canonicalize_source_url("http://example.com/x"),
            "http://www.example.com/x"
        );
        assert_eq!(
            canonicalize_source_url("http://www.example.com/x"),
            "http://www.example.com/x"
        );
    }

    #[test]
    fn canonicalize_is_safe_against_scheme_separator_in_query() {
        // The original substring rewrite would mangle this URL.
        assert_eq!(
            canonicalize_source_url("https://example.com/r?next=https://other.io/a"),
            "https://www.example.com/r?next=https://other.io/a"
        );
    }

    #[test]
    fn canonicalize_passes_unparseable_input_through() {
        assert_eq!(canonicalize_source_url("not a url"), "not a url");
        assert_eq!(canonicalize_source_url(""), "");
    }

    #[test]
    fn add_to_cart_end_to_end() {
        let signal = signal(json!({
            "email": "A@B.com",
            "phone": "+1 (555) 123-4567",
            "value": 10,
            "currency": "USD",
            "content_ids": ["p1"]
        }));
        let event = build_capi_event(EventName::AddToCart, &signal, 1_700_000_000);

        assert_eq!(event.event_name, "AddToCart");
        assert_eq!(event.event_time, 1_700_000_000);
        assert_eq!(event.action_source, "website");
        assert_eq!(
            event.user_data.em,
            Some(vec![
                "fb98d44ad7501a959f3f4f4a3f004fe2d9e581ea6207e218c4b02c08a4d75adf".to_string()
            ])
        );
        assert_eq!(
            event.user_data.ph,
            Some(vec![
                "d6736136ea896c1bfdc553e0e86e702c70d060d805696ca3e4e9e0961353860a".to_string()
            ])
        );
        assert_eq!(
            serde_json::to_value(&event.custom_data).unwrap(),
            json!({"value": 10, "currency": "USD", "content_ids": ["p1"]})
        );
    }

    #[test]
    fn build_is_deterministic_for_fixed_time() {
        let signal = signal(json!({
            "email": "a@b.com",
            "event_source_url": "https://shop.example/p/1",
            "test_event_code": " TEST123 "
        }));
        let a = build_capi_event(EventName::Purchase, &signal, 1_700_000_000);
        let b = build_capi_event(EventName::Purchase, &signal, 1_700_000_000);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.test_event_code.as_deref(), Some("TEST123"));
    }

    #[test]
    fn blank_test_event_code_is_dropped() {
        let event = build_capi_event(
            EventName::PageView,
            &signal(json!({"test_event_code": "   "})),
            1_700_000_000,
        );
        assert!(event.test_event_code.is_none());
    }
}

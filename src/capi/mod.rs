// capi/mod.rs — Meta Conversions API payload core.
//
// Everything here is pure: signal in, wire-ready event out. Hashing,
// field tables, and URL canonicalization live in the submodules; network
// dispatch is the graph module's job.

pub mod builder;
pub mod event;
pub mod hashing;
pub mod signal;

pub use builder::{build_capi_event, build_custom_data, build_user_data, canonicalize_source_url};
pub use event::{CapiEvent, Content, CustomData, EventName, EventsEnvelope, EventsResponse, UserData};
pub use signal::UserSignal;

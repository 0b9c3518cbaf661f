//! Reload webhook delivery.
//!
//! [`WebhookDispatcher`] calls every [`WebhookTarget`] through a
//! [`Transport`], retrying with a fixed backoff and recording each outcome.

mod dispatcher;
mod overlay;
mod target;
mod transport;

pub use dispatcher::{
    AttemptOutcome, DEFAULT_BACKOFF, DeliveryAttempt, DeliveryOutcome, DeliveryPolicy,
    DeliveryReport, WebhookDispatcher,
};
pub use overlay::{
    IdentityCredential, IdentityMaterial, OverlayConnector, OverlaySettings, select_transport,
};
pub use target::{Credentials, WebhookTarget};
pub(crate) use target::redact_userinfo;
pub use transport::{DirectTransport, Transport, TransportError};

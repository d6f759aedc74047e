//! # API Module
//!
//! HTTP handlers served by the short-lived loopback listener that receives
//! the OAuth authorization redirect.
//!
//! The listener answers every path through [`callback`], which feeds the
//! request into the [`AuthorizationSession`] state machine:
//!
//! - the registered callback path with a matching `state` and a `code`
//!   resolves the session with the code;
//! - an `error` parameter, a missing or forged `state`, or a missing `code`
//!   resolves it with a [`crate::error::ProtocolViolation`];
//! - foreign peers (403), unknown paths (404) and requests over the quota
//!   (429) are answered without touching the resolution.
//!
//! Every response is an HTML page with `charset=utf-8`; query-derived text is
//! escaped by [`crate::html`].

mod callback;

pub use callback::{
    AuthorizationSession, CallbackReply, CallbackResult, SharedSession, callback,
    is_loopback_peer,
};

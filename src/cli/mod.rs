//! # CLI Module
//!
//! User-facing commands of the `spotify-auth` binary. Each command builds on a
//! [`crate::management::TokenManager`] and reports through the colored
//! `info!`/`success!`/`warning!`/`error!` macros on stderr, so stdout stays
//! reserved for the access token itself.
//!
//! ```bash
//! spotify-auth auth        # log in (or refresh) and confirm
//! spotify-auth token       # print a usable access token
//! spotify-auth status      # show expiry of the stored login
//! spotify-auth logout      # forget the stored login
//! ```

mod auth;
mod status;

pub use auth::{auth, logout, token};
pub use status::status;

//! Spotify OAuth token lifecycle library.
//!
//! Obtains a user-authorized access token through the authorization-code
//! grant, keeps it on disk between runs and refreshes it shortly before it
//! expires. Tools only talk to [`management::TokenManager`]; everything else
//! is plumbing behind it.
//!
//! # Modules
//!
//! - `api` - request handling for the loopback callback listener
//! - `cli` - command-line front end
//! - `config` - environment variables and derived settings
//! - `error` - error taxonomy shared by every component
//! - `html` - static pages returned to the browser
//! - `logging` - tracing subscriber with secret redaction
//! - `management` - token store and lifecycle manager
//! - `redact` - masking of credentials in diagnostic text
//! - `server` - loopback HTTP listener for the authorization callback
//! - `spotify` - authorization URL and token endpoint calls
//! - `types` - credentials, token records and status views
//! - `utils` - state generation and time helpers

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod html;
pub mod logging;
pub mod management;
pub mod redact;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::{AuthError, AuthErrorKind};
pub use management::{TokenManager, TokenStore};

/// Prints an informational message with a blue bullet point.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits with
/// status 1.
///
/// Only for the binary's top level; library code returns [`AuthError`].
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}

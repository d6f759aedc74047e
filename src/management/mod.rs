mod auth;
mod store;

pub use auth::{BrowserLauncher, REFRESH_RETRY_DELAY, SystemBrowser, TokenManager};
pub use store::TokenStore;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{AuthError, error, management::TokenManager, success, warning};

/// Makes sure a usable login exists, opening the browser when needed.
pub async fn auth(manager: &TokenManager) {
    match obtain(manager).await {
        Ok(_) => success!("Authorized with Spotify."),
        Err(e) => error!("Authorization failed: {}", e.user_message()),
    }
}

/// Prints a usable access token on stdout.
pub async fn token(manager: &TokenManager) {
    match obtain(manager).await {
        Ok(token) => println!("{token}"),
        Err(e) => error!("Cannot provide an access token: {}", e.user_message()),
    }
}

/// Removes the stored login.
pub async fn logout(manager: &TokenManager) {
    match manager.logout().await {
        Ok(()) => success!("Logged out. Token file removed."),
        Err(e) => warning!("Could not remove the token file: {}", e.user_message()),
    }
}

async fn obtain(manager: &TokenManager) -> Result<String, AuthError> {
    let pb = ProgressBar::new_spinner();
    pb.set_message("Waiting for a usable Spotify token...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let result = manager.usable_credential().await;
    pb.finish_and_clear();
    result
}

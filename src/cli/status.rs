use chrono::Local;
use tabled::Table;

use crate::{
    error, info,
    management::TokenManager,
    types::{TokenStatus, TokenStatusRow},
    warning,
};

/// Shows the stored login without revealing any token.
pub async fn status(manager: &TokenManager) {
    let status = match manager.status().await {
        Ok(Some(status)) => status,
        Ok(None) => {
            warning!("Not logged in. Run `spotify-auth auth` first.");
            return;
        }
        Err(e) => error!("Cannot read the stored login: {}", e.user_message()),
    };

    info!("Token file: {}", manager.store().path().display());
    println!("{}", Table::new(rows(&status)));
}

fn rows(status: &TokenStatus) -> Vec<TokenStatusRow> {
    let expires = status
        .expires_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    vec![
        TokenStatusRow {
            field: "expires at".to_string(),
            value: expires,
        },
        TokenStatusRow {
            field: "refresh due".to_string(),
            value: yes_no(status.refresh_due),
        },
        TokenStatusRow {
            field: "refresh token".to_string(),
            value: if status.has_refresh_token {
                "present".to_string()
            } else {
                "missing".to_string()
            },
        },
    ]
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "yes" } else { "no" };
    label.to_string()
}

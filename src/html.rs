//! Pages returned to the browser at the end of the authorization redirect.
//!
//! Anything taken from the query string goes through [`escape`] before it is
//! embedded.

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body><h2>{title}</h2>{body}</body></html>"
    )
}

pub fn success() -> String {
    page(
        "Authentication successful",
        "<p>You can close this window and return to your assistant.</p>",
    )
}

/// The authorization server redirected with `error=...`.
pub fn denied(error: &str) -> String {
    page(
        "Authentication failed",
        &format!(
            "<p>Spotify reported: <code>{}</code></p><p>You can close this window.</p>",
            escape(error)
        ),
    )
}

pub fn failed(reason: &str) -> String {
    page(
        "Authentication failed",
        &format!("<p>{}</p><p>You can close this window and retry.</p>", escape(reason)),
    )
}

pub fn not_found() -> String {
    page("Not found", "")
}

pub fn forbidden() -> String {
    page("Forbidden", "<p>Only local requests are accepted.</p>")
}

pub fn too_many_requests() -> String {
    page("Too many requests", "")
}

pub fn gone() -> String {
    page("Login already completed", "<p>You can close this window.</p>")
}

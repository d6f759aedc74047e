//! Redaction of credentials from anything that reaches a log.
//!
//! Two passes run over every line: values of known sensitive fields
//! (`access_token=...`, `"refreshToken": "..."`, `Bearer ...`) are masked, then
//! any remaining long opaque run of token alphabet characters that mixes
//! letters and digits is masked as well. [`RedactingWriter`] applies both to
//! the formatted output of the tracing subscriber.

use std::{
    io::{self, Write},
    sync::LazyLock,
};

use regex::{Captures, Regex};
use tracing_subscriber::fmt::MakeWriter;

pub const MASK: &str = "[REDACTED]";

/// Opaque runs shorter than this are left alone.
const OPAQUE_MIN_LEN: usize = 32;

static SENSITIVE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)("?\b(?:access_?token|refresh_?token|id_?token|client_?secret|code|state|password|secret)\b"?\s*[:=]\s*"?)([^"\s&,;}]+)"#,
    )
    .expect("sensitive field pattern")
});

static AUTH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9\-._~+/]+=*").expect("auth header pattern")
});

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi escape pattern"));

static OPAQUE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_\-]+").expect("opaque run pattern"));

/// Returns `text` with credentials masked.
///
/// Terminal colour codes are dropped first; they would otherwise split a field
/// name from its value.
pub fn redact(text: &str) -> String {
    let plain = ANSI_ESCAPE.replace_all(text, "");
    let masked = SENSITIVE_FIELD.replace_all(&plain, |caps: &Captures| {
        format!("{}{}", &caps[1], MASK)
    });
    let masked = AUTH_HEADER.replace_all(&masked, |caps: &Captures| {
        format!("{} {}", &caps[1], MASK)
    });
    OPAQUE_RUN
        .replace_all(&masked, |caps: &Captures| {
            let run = &caps[0];
            if looks_like_token(run) {
                MASK.to_string()
            } else {
                run.to_string()
            }
        })
        .into_owned()
}

fn looks_like_token(run: &str) -> bool {
    run.len() >= OPAQUE_MIN_LEN
        && run.bytes().any(|b| b.is_ascii_digit())
        && run.bytes().any(|b| b.is_ascii_alphabetic())
}

/// `io::Write` adapter that redacts each buffer before passing it on.
///
/// The fmt subscriber formats a whole event into one buffer and writes it in a
/// single call, so patterns never straddle two writes.
pub struct RedactingWriter<W> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Hands the subscriber a redacting stderr writer per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedactingStderr;

impl<'a> MakeWriter<'a> for RedactingStderr {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(io::stderr())
    }
}

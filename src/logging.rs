//! Tracing subscriber setup.
//!
//! Logs go to stderr (stdout belongs to whatever protocol the host process
//! speaks) through [`RedactingStderr`], so token values and the client secret
//! never reach a log line even when an error path formats a raw body.

use tracing_subscriber::{
    EnvFilter,
    fmt::{
        MakeWriter, SubscriberBuilder,
        format::{DefaultFields, Format, Full},
    },
};

use crate::redact::RedactingStderr;

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
/// Calling this twice is harmless; the second call is ignored.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = builder(env_filter, RedactingStderr).try_init();
}

/// Plain-text fmt subscriber. Colour codes are off so field names stay
/// adjacent to their values for the redactor.
fn builder<W>(
    env_filter: EnvFilter,
    writer: W,
) -> SubscriberBuilder<DefaultFields, Format<Full>, EnvFilter, W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };

    use tracing::warn;

    use super::*;
    use crate::redact::{MASK, RedactingWriter};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn log_secrets(ansi: bool) -> String {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = builder(EnvFilter::new("debug"), move || {
            RedactingWriter::new(sink.clone())
        })
        .with_ansi(ansi)
        .finish();

        tracing::subscriber::with_default(subscriber, || {
            warn!(
                client_secret = "hunter2secret",
                refresh_token = "shortrt",
                "token endpoint call"
            );
        });
        captured.text()
    }

    #[test]
    fn short_secrets_are_masked_in_log_lines() {
        let out = log_secrets(false);
        assert!(out.contains("token endpoint call"));
        assert!(!out.contains("hunter2secret"));
        assert!(!out.contains("shortrt"));
        assert!(out.contains(MASK));
    }

    #[test]
    fn colour_codes_do_not_defeat_masking() {
        let out = log_secrets(true);
        assert!(out.contains("token endpoint call"));
        assert!(!out.contains("hunter2secret"));
        assert!(!out.contains("shortrt"));
    }
}

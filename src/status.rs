//! Run-wide error aggregation and the self-reporting status feed.
//!
//! Every component that can fail softly receives `&mut ErrorLog` and appends
//! to it; nothing is thrown past a feed boundary. At the end of a run the
//! runner turns a non-empty log into a single status post with
//! [`ErrorLog::status_post`] and merges it into the status channel.
//!
//! Each entry is also mirrored to the console as a `warn!` event so operators
//! watching the process see failures as they happen.

use crate::error::SitefeedError;
use crate::models::{Post, TOOL_NAME, format_pub_date};
use crate::utils::{escape_html, truncate_for_log};
use chrono::{DateTime, FixedOffset};
use std::error::Error;
use tracing::warn;

/// One diagnostic accumulated during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A plain, already formatted message.
    Message {
        prefix: Option<String>,
        text: String,
    },
    /// A lower-level failure together with its cause chain.
    Failure {
        prefix: Option<String>,
        kind: String,
        message: String,
        causes: Vec<String>,
    },
}

impl LogEntry {
    fn render(&self) -> String {
        match self {
            LogEntry::Message { prefix, text } => match prefix {
                Some(p) => format!("{p}: {text}\n"),
                None => format!("{text}\n"),
            },
            LogEntry::Failure {
                prefix,
                kind,
                message,
                causes,
            } => {
                let mut out = String::new();
                if let Some(p) = prefix {
                    out.push_str(p);
                    out.push_str(": ");
                }
                out.push_str(&format!("Error encountered ({kind}):\n"));
                out.push_str("<blockquote><samp style=\"color:red;\">\n");
                out.push_str(&escape_html(message));
                out.push_str("<div style=\"margin-left: 2em\">");
                for cause in causes {
                    out.push_str("\n\tcaused by: ");
                    out.push_str(&escape_html(cause));
                }
                out.push_str("\n</div></samp></blockquote>");
                out
            }
        }
    }
}

/// Ordered, append-only log of everything that went wrong during one run.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<LogEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a plain message.
    pub fn record(&mut self, text: impl Into<String>) {
        self.push(LogEntry::Message {
            prefix: None,
            text: text.into(),
        });
    }

    /// Record a plain message introduced by `prefix` (rendered as `prefix: text`).
    pub fn record_with(&mut self, prefix: impl Into<String>, text: impl Into<String>) {
        self.push(LogEntry::Message {
            prefix: Some(prefix.into()),
            text: text.into(),
        });
    }

    /// Record a crate failure, classified by its variant.
    pub fn record_failure(&mut self, prefix: Option<&str>, err: &SitefeedError) {
        self.record_error(prefix, err.kind(), err);
    }

    /// Record any error with an explicit classification label.
    pub fn record_error(&mut self, prefix: Option<&str>, kind: &str, err: &(dyn Error + 'static)) {
        self.push(LogEntry::Failure {
            prefix: prefix.map(str::to_string),
            kind: kind.to_string(),
            message: err.to_string(),
            causes: cause_chain(err),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Concatenate every entry, in recording order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(LogEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the status post summarising this run, or `None` when nothing was recorded.
    pub fn status_post(&self, now: &DateTime<FixedOffset>, link: &str) -> Option<Post> {
        if self.is_empty() {
            return None;
        }
        Some(Post {
            title: format!("Errors while running {TOOL_NAME}"),
            pub_date: format_pub_date(now),
            description: self.render().replace('\n', "<br>"),
            link: link.to_string(),
            guid: None,
            author: Some(TOOL_NAME.to_string()),
        })
    }

    fn push(&mut self, entry: LogEntry) {
        let rendered = entry.render();
        warn!(
            entry = %truncate_for_log(&rendered, 500),
            "Recorded run error"
        );
        self.entries.push(entry);
    }
}

/// Follow `source()` links until they run out or loop back on themselves.
fn cause_chain(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut seen: Vec<*const ()> = vec![err as *const dyn Error as *const ()];
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        let ptr = cause as *const dyn Error as *const ();
        if seen.contains(&ptr) {
            break;
        }
        seen.push(ptr);
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Layer {
        msg: &'static str,
        inner: Option<Box<Layer>>,
    }

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.inner.as_deref().map(|l| l as &(dyn Error + 'static))
        }
    }

    #[derive(Debug)]
    struct Looping;

    impl fmt::Display for Looping {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("looping")
        }
    }

    impl Error for Looping {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self)
        }
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-14T12:00:00+00:00").unwrap()
    }

    #[test]
    fn test_messages_render_in_order_with_prefix() {
        let mut log = ErrorLog::new();
        log.record("first");
        log.record_with("Unknown day of week", "funday");
        assert_eq!(log.len(), 2);
        assert_eq!(log.render(), "first\n\nUnknown day of week: funday\n");
    }

    #[test]
    fn test_failure_renders_full_cause_chain() {
        let err = Layer {
            msg: "top",
            inner: Some(Box::new(Layer {
                msg: "middle",
                inner: Some(Box::new(Layer {
                    msg: "bottom",
                    inner: None,
                })),
            })),
        };
        let mut log = ErrorLog::new();
        log.record_error(Some("Fetching page"), "Http", &err);

        match &log.entries()[0] {
            LogEntry::Failure { kind, message, causes, .. } => {
                assert_eq!(kind, "Http");
                assert_eq!(message, "top");
                assert_eq!(causes, &vec!["middle".to_string(), "bottom".to_string()]);
            }
            other => panic!("unexpected entry {other:?}"),
        }
        let rendered = log.render();
        assert!(rendered.starts_with("Fetching page: Error encountered (Http):"));
        assert!(rendered.contains("caused by: middle"));
        assert!(rendered.contains("caused by: bottom"));
    }

    #[test]
    fn test_self_referential_cause_stops() {
        let mut log = ErrorLog::new();
        log.record_error(None, "Loop", &Looping);
        match &log.entries()[0] {
            LogEntry::Failure { causes, .. } => assert!(causes.is_empty()),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_record_failure_uses_variant_kind() {
        let mut log = ErrorLog::new();
        let err = SitefeedError::Config("bad".into());
        log.record_failure(None, &err);
        assert!(log.render().contains("Error encountered (Config)"));
    }

    #[test]
    fn test_status_post_only_when_non_empty() {
        let mut log = ErrorLog::new();
        assert!(log.status_post(&now(), "file:///status.xml").is_none());

        log.record("line one\nline two");
        let post = log.status_post(&now(), "file:///status.xml").unwrap();
        assert_eq!(post.title, "Errors while running Sitefeed");
        assert_eq!(post.author.as_deref(), Some("Sitefeed"));
        assert_eq!(post.description, "line one<br>line two<br>");
        assert_eq!(post.pub_date, "Wed, 14 Oct 2026 12:00:00 +0000");
    }
}

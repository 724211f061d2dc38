//! Data models shared by extraction, merging and status reporting.
//!
//! - [`Post`]: one syndicated entry, either freshly extracted from a page or
//!   synthesized from the run's error log
//! - [`TOOL_NAME`]: how the tool names itself in generated documents

use chrono::{DateTime, FixedOffset};

/// Name written to `generator` elements and used as the status post author.
pub const TOOL_NAME: &str = "Sitefeed";

/// A post about to be merged into a feed channel.
///
/// Candidate posts only live for the duration of one feed's processing; once
/// merged they exist as an item in the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Whitespace-normalized post title.
    pub title: String,
    /// Publication date exactly as found on the page (or generated).
    pub pub_date: String,
    /// Plain text, or a markup fragment for composite descriptions.
    pub description: String,
    /// Absolute permalink.
    pub link: String,
    /// Stable identifier; equal to `link` when emitted.
    pub guid: Option<String>,
    /// Author line; `None` omits the element entirely.
    pub author: Option<String>,
}

/// Render a timestamp the way generated `pubDate` values are written.
pub fn format_pub_date(now: &DateTime<FixedOffset>) -> String {
    now.to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pub_date_is_rfc2822() {
        let now = DateTime::parse_from_rfc3339("2026-10-14T12:30:00+02:00").unwrap();
        assert_eq!(format_pub_date(&now), "Wed, 14 Oct 2026 12:30:00 +0200");
    }
}

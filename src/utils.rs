//! Utility functions for diagnostic formatting, string clean-up, and file system checks.
//!
//! Diagnostics end up inside the status feed, which is read in a feed reader,
//! so the helpers here produce small HTML fragments:
//! - Emphasis helpers for selectors, feed titles and URLs
//! - Escaping of page markup and config snippets so they render as text
//! - Natural-language lists for missing configuration keys

use crate::error::SitefeedError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Collapse every run of whitespace (including newlines) to one space and trim the ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_whitespace("  Hello\n\t world "), "Hello world");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Escape text so it can be embedded in an HTML fragment verbatim.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn bold(text: &str) -> String {
    format!("<b>{}</b>", escape_html(text))
}

pub fn italic(text: &str) -> String {
    format!("<i>{}</i>", escape_html(text))
}

/// Render a URL as a clickable, underlined link.
pub fn link(url: &str) -> String {
    let escaped = escape_html(url);
    format!("<a href=\"{escaped}\"><u>{escaped}</u></a>")
}

/// Show a chunk of markup (a page node or a persisted item) as highlighted text.
///
/// Tags are put on their own lines so long one-line documents stay readable.
pub fn quote_markup(markup: &str) -> String {
    let spaced = markup.replace("><", ">\n<");
    let highlighted = escape_html(&spaced)
        .replace("&lt;", "<span style=\"color:blue;\">&lt;")
        .replace("&gt;", "&gt;</span>");
    format!("\n<blockquote>{highlighted}</blockquote>\n")
}

/// Show a configuration snippet as an indented, pretty-printed code block.
pub fn json_block(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!(
        "\n\n<div style=\"margin-left: 2em; color:green;\"><pre><code>{}</code></pre></div>\n",
        escape_html(&pretty)
    )
}

/// Join names into a bolded natural-language list.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(bold_list(&["url"]), "<b>url</b>");
/// assert_eq!(bold_list(&["url", "file"]), "<b>url</b> and <b>file</b>");
/// assert_eq!(bold_list(&["a", "b", "c"]), "<b>a</b>, <b>b</b>, and <b>c</b>");
/// ```
pub fn bold_list<S: AsRef<str>>(names: &[S]) -> String {
    let parts: Vec<String> = names.iter().map(|n| bold(n.as_ref())).collect();
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        2 => format!("{} and {}", parts[0], parts[1]),
        n => format!("{}, and {}", parts[..n - 1].join(", "), parts[n - 1]),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to roughly `max` bytes (never splitting a
/// character) with an ellipsis and byte count appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), SitefeedError> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Feeds directory is writable");
    Ok(())
}

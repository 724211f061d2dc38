//! Fetched pages and the source that fetches them.
//!
//! [`Page`] wraps a parsed `scraper` document together with the URL it came
//! from so link-like attributes can be resolved to absolute URLs. Selector
//! parsing is fallible; a malformed selector surfaces as
//! [`SitefeedError::Selector`] rather than a panic.
//!
//! [`PageSource`] is the seam to the network: production code uses
//! [`HttpPageSource`], tests serve canned HTML.

use crate::error::SitefeedError;
use scraper::{ElementRef, Html, Selector};
use std::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

/// A parsed page ready for querying.
#[derive(Debug)]
pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    /// Parse `body` as an HTML document served from `url`.
    pub fn parse(url: &str, body: &str) -> Result<Self, SitefeedError> {
        Ok(Self {
            url: Url::parse(url)?,
            html: Html::parse_document(body),
        })
    }

    /// First node matching `selector`, or `Ok(None)` when nothing matches.
    pub fn try_select_first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, SitefeedError> {
        let parsed = compile(selector)?;
        Ok(self.html.select(&parsed).next())
    }

    /// Every node matching `selector`, in document order.
    pub fn try_select_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, SitefeedError> {
        let parsed = compile(selector)?;
        Ok(self.html.select(&parsed).collect())
    }

    /// Attribute `name` of `element`, resolved against the page URL.
    ///
    /// Returns `None` when the attribute is missing, blank, or unresolvable.
    pub fn absolute_attr(&self, element: ElementRef<'_>, name: &str) -> Option<String> {
        let raw = element.value().attr(name)?.trim();
        if raw.is_empty() {
            return None;
        }
        self.url.join(raw).ok().map(String::from)
    }
}

fn compile(selector: &str) -> Result<Selector, SitefeedError> {
    Selector::parse(selector).map_err(|e| SitefeedError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// All text beneath `element`, concatenated.
pub fn whole_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// `tag#id.class1.class2` signature of a node.
pub fn signature(element: ElementRef<'_>) -> String {
    let value = element.value();
    let mut sig = value.name().to_string();
    if let Some(id) = value.id() {
        sig.push('#');
        sig.push_str(id);
    }
    for class in value.classes() {
        sig.push('.');
        sig.push_str(class);
    }
    sig
}

/// A selector that uniquely locates `element`, from the nearest id (or the root) down.
///
/// Same-tag siblings are told apart with `:nth-child(n)`.
pub fn css_path(element: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);
    while let Some(node) = current {
        let value = node.value();
        if let Some(id) = value.id() {
            segments.push(format!("#{id}"));
            break;
        }
        let mut segment = value.name().to_string();
        for class in value.classes() {
            segment.push('.');
            segment.push_str(class);
        }
        let parent = node.parent().and_then(ElementRef::wrap);
        if let Some(parent) = parent {
            let siblings: Vec<ElementRef<'_>> = parent.children().filter_map(ElementRef::wrap).collect();
            let same_tag = siblings
                .iter()
                .filter(|s| s.value().name() == value.name())
                .count();
            if same_tag > 1 {
                if let Some(pos) = siblings.iter().position(|s| *s == node) {
                    segment.push_str(&format!(":nth-child({})", pos + 1));
                }
            }
        }
        segments.push(segment);
        current = parent;
    }
    segments.reverse();
    segments.join(" > ")
}

/// Fetches pages by URL.
pub trait PageSource {
    /// Retrieve and parse the page at `url`.
    async fn fetch(&self, url: &str) -> Result<Page, SitefeedError>;
}

/// [`PageSource`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new() -> Result<Self, SitefeedError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitefeed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Page, SitefeedError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Page request rejected");
                return Err(e.into());
            }
        };
        let body = response.text().await?;
        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Page::parse(url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
          <div class="post">
            <h1 class="title">First <em>post</em></h1>
            <a class="more" href="/posts/1">read</a>
            <a class="empty" href="  ">nothing</a>
          </div>
          <div class="post"><h1 class="title">Second</h1></div>
          <section id="side"><p>Side</p></section>
        </body></html>
    "#;

    fn page() -> Page {
        Page::parse("https://example.com/blog/", HTML).unwrap()
    }

    #[test]
    fn test_select_first_and_all() {
        let page = page();
        let first = page.try_select_first("h1.title").unwrap().unwrap();
        assert_eq!(whole_text(first), "First post");
        assert_eq!(page.try_select_all("h1.title").unwrap().len(), 2);
        assert!(page.try_select_first("h2").unwrap().is_none());
    }

    #[test]
    fn test_bad_selector_is_an_error() {
        let err = page().try_select_first("div[").unwrap_err();
        assert_eq!(err.kind(), "Selector");
    }

    #[test]
    fn test_absolute_attr() {
        let page = page();
        let more = page.try_select_first("a.more").unwrap().unwrap();
        assert_eq!(
            page.absolute_attr(more, "href").as_deref(),
            Some("https://example.com/posts/1")
        );
        let empty = page.try_select_first("a.empty").unwrap().unwrap();
        assert_eq!(page.absolute_attr(empty, "href"), None);
        let title = page.try_select_first("h1").unwrap().unwrap();
        assert_eq!(page.absolute_attr(title, "href"), None);
    }

    #[test]
    fn test_signature() {
        let page = page();
        let div = page.try_select_first("div.post").unwrap().unwrap();
        assert_eq!(signature(div), "div.post");
        let side = page.try_select_first("section").unwrap().unwrap();
        assert_eq!(signature(side), "section#side");
    }

    #[test]
    fn test_css_path() {
        let page = page();
        let second = page.try_select_all("h1.title").unwrap()[1];
        assert_eq!(
            css_path(second),
            "html > body > div.post:nth-child(2) > h1.title"
        );
        let side_p = page.try_select_first("#side p").unwrap().unwrap();
        assert_eq!(css_path(side_p), "#side > p");
    }
}

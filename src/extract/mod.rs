//! Post extraction: applying a feed's template to a fetched page.
//!
//! Extraction is a single pass that produces at most one candidate [`Post`].
//! A missing match is never fatal except for the title; every other field
//! has a documented substitute and a reported diagnostic:
//!
//! | Field | When nothing matches |
//! |-------|----------------------|
//! | title | no post this pass |
//! | publish date | current time |
//! | permalink | the feed's source URL (also when the match has no usable `href`) |
//! | description (single) | the post title |
//! | description (composite) | the failing component is skipped |
//! | author | omitted |
//!
//! In debug runs each failing selector is additionally relaxed with
//! [`diagnose::diagnose`] and the findings are attached to the log entry.
//!
//! # Submodules
//!
//! - [`page`]: parsed pages, node helpers and the [`PageSource`] seam
//! - [`diagnose`]: selector relaxation diagnostics

pub mod diagnose;
pub mod page;

pub use page::{HttpPageSource, Page, PageSource};

use crate::config::{DescriptionSpec, FeedDefinition};
use crate::error::SitefeedError;
use crate::models::{Post, format_pub_date};
use crate::status::ErrorLog;
use crate::utils::{bold, italic, link, normalize_whitespace};
use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use page::whole_text;
use scraper::ElementRef;
use tracing::{debug, instrument};

/// Applies one feed's template to one page.
#[derive(Debug)]
pub struct Extractor<'a> {
    page: &'a Page,
    feed: &'a FeedDefinition,
    debug: bool,
}

impl<'a> Extractor<'a> {
    pub fn new(page: &'a Page, feed: &'a FeedDefinition, debug: bool) -> Self {
        Self { page, feed, debug }
    }

    /// Build the candidate post for this pass.
    ///
    /// `Ok(None)` means the title could not be found (already reported).
    /// Selector syntax errors are returned as `Err` and abort the pass.
    #[instrument(level = "info", skip_all, fields(feed = %self.feed.title))]
    pub fn extract(
        &self,
        now: &DateTime<FixedOffset>,
        log: &mut ErrorLog,
    ) -> Result<Option<Post>, SitefeedError> {
        let template = &self.feed.template;

        let Some(title_node) = self.page.try_select_first(&template.title_query)? else {
            self.query_failed(
                log,
                format!(
                    "Could not select title with query {} in site {} ({})",
                    bold(&template.title_query),
                    link(&self.feed.url),
                    italic(&self.feed.title)
                ),
                &template.title_query,
            );
            return Ok(None);
        };
        let title = normalize_whitespace(&whole_text(title_node));

        let pub_date = match &template.publish_date_query {
            None => format_pub_date(now),
            Some(query) => match self.page.try_select_first(query)? {
                Some(node) => normalize_whitespace(&whole_text(node)),
                None => {
                    self.could_not_find(log, query, "publish date", "current time");
                    format_pub_date(now)
                }
            },
        };

        let link = self.permalink(log)?;
        let description = self.description(&title, log)?;
        let author = self.author(log)?;
        let guid = self.feed.include_guid.then(|| link.clone());

        debug!(%title, %link, "Extracted candidate post");
        Ok(Some(Post {
            title,
            pub_date,
            description,
            link,
            guid,
            author,
        }))
    }

    fn permalink(&self, log: &mut ErrorLog) -> Result<String, SitefeedError> {
        let query = &self.feed.template.permalink_query;
        match self.page.try_select_first(query)? {
            Some(node) => match self.page.absolute_attr(node, "href") {
                Some(href) => Ok(href),
                None => {
                    self.query_failed(
                        log,
                        format!(
                            "Permalink query {} in site {} ({}) matched an element without a usable link, using site url",
                            bold(query),
                            link(&self.feed.url),
                            italic(&self.feed.title)
                        ),
                        query,
                    );
                    Ok(self.feed.url.clone())
                }
            },
            None => {
                self.could_not_find(log, query, "permalink", "site url");
                Ok(self.feed.url.clone())
            }
        }
    }

    fn description(&self, title: &str, log: &mut ErrorLog) -> Result<String, SitefeedError> {
        match &self.feed.template.description {
            DescriptionSpec::Absent => Ok(title.to_string()),
            DescriptionSpec::Single(query) => match self.page.try_select_first(query)? {
                Some(node) => Ok(whole_text(node).trim().to_string()),
                None => {
                    self.could_not_find(log, query, "post description", "post title");
                    Ok(title.to_string())
                }
            },
            DescriptionSpec::Composite(queries) => {
                let mut description = String::new();
                for query in queries {
                    match self.page.try_select_first(query)? {
                        Some(node) => description.push_str(&node.html()),
                        None => self.query_failed(
                            log,
                            format!(
                                "Could not find description component with query {} in site {} ({}), skipping",
                                bold(query),
                                link(&self.feed.url),
                                italic(&self.feed.title)
                            ),
                            query,
                        ),
                    }
                }
                Ok(description)
            }
        }
    }

    fn author(&self, log: &mut ErrorLog) -> Result<Option<String>, SitefeedError> {
        let Some(query) = &self.feed.template.author_query else {
            return Ok(None);
        };
        let found = if self.feed.template.multi_author {
            let nodes = self.page.try_select_all(query)?;
            join_authors(&nodes)
        } else {
            self.page
                .try_select_first(query)?
                .map(|node| normalize_whitespace(&whole_text(node)))
                .filter(|name| !name.is_empty())
        };
        if found.is_none() {
            self.could_not_find(log, query, "post author", "no author");
        }
        Ok(found)
    }

    fn could_not_find(&self, log: &mut ErrorLog, query: &str, what: &str, fallback: &str) {
        self.query_failed(
            log,
            format!(
                "Could not find {what} with query {} in site {} ({}), using {fallback}",
                bold(query),
                link(&self.feed.url),
                italic(&self.feed.title)
            ),
            query,
        );
    }

    /// Record a selector miss, with relaxation diagnostics in debug runs.
    fn query_failed(&self, log: &mut ErrorLog, message: String, query: &str) {
        if self.debug {
            let diagnosis = diagnose::diagnose(self.page, query);
            log.record(format!("{message}{}", diagnosis.render()));
        } else {
            log.record(message);
        }
    }
}

/// Trimmed text of every node, blanks dropped, joined with `" & "`.
fn join_authors(nodes: &[ElementRef<'_>]) -> Option<String> {
    let names: Vec<String> = nodes
        .iter()
        .map(|node| normalize_whitespace(&whole_text(*node)))
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.iter().join(" & "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostTemplate;
    use crate::schedule::Schedule;

    const HTML: &str = r#"
        <html><body>
          <article class="post">
            <h1 class="title">
              Release   notes
              for v2
            </h1>
            <time>  2026-10-01  </time>
            <a class="permalink" href="/posts/v2">Read more</a>
            <a class="broken">no href</a>
            <p class="lede">The short version.</p>
            <figure><img src="/v2.png"></figure>
            <span class="author"> Ada </span>
            <span class="author">   </span>
            <span class="author">Grace</span>
          </article>
        </body></html>
    "#;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-14T12:00:00+00:00").unwrap()
    }

    fn feed(template: PostTemplate) -> FeedDefinition {
        FeedDefinition {
            url: "https://example.com/blog".into(),
            title: "Example".into(),
            description: "d".into(),
            file: "example".into(),
            keep: 10,
            verify_uniqueness: false,
            include_guid: true,
            schedule: Schedule::default(),
            template,
        }
    }

    fn template() -> PostTemplate {
        PostTemplate {
            title_query: "article h1.title".into(),
            publish_date_query: Some("article time".into()),
            permalink_query: "a.permalink".into(),
            description: DescriptionSpec::Single("p.lede".into()),
            author_query: Some("span.author".into()),
            multi_author: false,
        }
    }

    fn run(template: PostTemplate, debug: bool) -> (Option<Post>, ErrorLog) {
        let page = Page::parse("https://example.com/blog", HTML).unwrap();
        let feed = feed(template);
        let mut log = ErrorLog::new();
        let post = Extractor::new(&page, &feed, debug)
            .extract(&now(), &mut log)
            .unwrap();
        (post, log)
    }

    #[test]
    fn test_all_fields_found() {
        let (post, log) = run(template(), false);
        let post = post.unwrap();
        assert!(log.is_empty(), "{}", log.render());
        assert_eq!(post.title, "Release notes for v2");
        assert_eq!(post.pub_date, "2026-10-01");
        assert_eq!(post.link, "https://example.com/posts/v2");
        assert_eq!(post.guid.as_deref(), Some("https://example.com/posts/v2"));
        assert_eq!(post.description, "The short version.");
        assert_eq!(post.author.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_missing_title_aborts_pass() {
        let mut t = template();
        t.title_query = "article h2".into();
        let (post, log) = run(t, false);
        assert!(post.is_none());
        assert_eq!(log.len(), 1);
        assert!(log.render().contains("Could not select title"));
    }

    #[test]
    fn test_absent_optional_queries() {
        let t = PostTemplate {
            publish_date_query: None,
            description: DescriptionSpec::Absent,
            author_query: None,
            ..template()
        };
        let (post, log) = run(t, false);
        let post = post.unwrap();
        assert!(log.is_empty());
        assert_eq!(post.pub_date, "Wed, 14 Oct 2026 12:00:00 +0000");
        assert_eq!(post.description, "Release notes for v2");
        assert_eq!(post.author, None);
    }

    #[test]
    fn test_field_fallbacks() {
        let t = PostTemplate {
            publish_date_query: Some("article .date".into()),
            permalink_query: "a.nowhere".into(),
            description: DescriptionSpec::Single("p.missing".into()),
            author_query: Some("span.byline".into()),
            ..template()
        };
        let (post, log) = run(t, false);
        let post = post.unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(post.pub_date, "Wed, 14 Oct 2026 12:00:00 +0000");
        assert_eq!(post.link, "https://example.com/blog");
        assert_eq!(post.description, "Release notes for v2");
        assert_eq!(post.author, None);
    }

    #[test]
    fn test_permalink_without_href_has_distinct_message() {
        let t = PostTemplate {
            permalink_query: "a.broken".into(),
            ..template()
        };
        let (post, log) = run(t, false);
        assert_eq!(post.unwrap().link, "https://example.com/blog");
        assert_eq!(log.len(), 1);
        assert!(log.render().contains("without a usable link"));
    }

    #[test]
    fn test_composite_description_skips_missing_component() {
        let t = PostTemplate {
            description: DescriptionSpec::Composite(vec!["p.lede".into(), "aside.missing".into()]),
            ..template()
        };
        let (post, log) = run(t, false);
        assert_eq!(post.unwrap().description, r#"<p class="lede">The short version.</p>"#);
        assert_eq!(log.len(), 1);
        assert!(log.render().contains("description component"));
    }

    #[test]
    fn test_multi_author_joins_non_blank_matches() {
        let t = PostTemplate {
            multi_author: true,
            ..template()
        };
        let (post, _) = run(t, false);
        assert_eq!(post.unwrap().author.as_deref(), Some("Ada & Grace"));
    }

    #[test]
    fn test_guid_omitted_when_disabled() {
        let page = Page::parse("https://example.com/blog", HTML).unwrap();
        let mut feed = feed(template());
        feed.include_guid = false;
        let mut log = ErrorLog::new();
        let post = Extractor::new(&page, &feed, false)
            .extract(&now(), &mut log)
            .unwrap()
            .unwrap();
        assert_eq!(post.guid, None);
    }

    #[test]
    fn test_debug_mode_attaches_diagnosis() {
        let t = PostTemplate {
            author_query: Some("article span.byline".into()),
            ..template()
        };
        let (_, log) = run(t, true);
        let rendered = log.render();
        assert!(rendered.contains("Relaxed query <b>article</b>"));
        assert!(rendered.contains("<code>article.post</code>"));
    }

    #[test]
    fn test_selector_syntax_error_aborts() {
        let page = Page::parse("https://example.com/blog", HTML).unwrap();
        let feed = feed(PostTemplate {
            title_query: "h1[".into(),
            ..template()
        });
        let mut log = ErrorLog::new();
        let err = Extractor::new(&page, &feed, false)
            .extract(&now(), &mut log)
            .unwrap_err();
        assert_eq!(err.kind(), "Selector");
    }
}

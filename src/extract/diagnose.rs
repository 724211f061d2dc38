//! Selector diagnostics for debug runs.
//!
//! When a selector finds nothing, it is relaxed one trailing token at a time
//! until some prefix matches. The first match, its fully-qualified path and
//! its direct children are reported so a template author can see where the
//! page structure diverged from the selector. The result is advisory only.

use super::page::{Page, css_path, signature};
use crate::utils::{bold, normalize_whitespace};
use scraper::ElementRef;
use tracing::debug;

/// Stands in for `"> "` while truncating so a direct-child combinator is
/// never split from the token it governs.
const CHILD_COMBINATOR: char = '\u{1f}';

/// A node as shown in a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub signature: String,
    pub path: String,
}

impl NodeReport {
    fn of(element: ElementRef<'_>) -> Self {
        Self {
            signature: signature(element),
            path: css_path(element),
        }
    }
}

/// Outcome of relaxing a selector that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// `selector` is the first relaxation that matched.
    Found {
        selector: String,
        node: NodeReport,
        children: Vec<NodeReport>,
    },
    NothingFound,
}

/// Successively shorter forms of `selector`, most specific first.
///
/// Each step drops the last whitespace-separated token, plus a dangling
/// `>` combinator if the cut leaves one.
pub fn relaxations(selector: &str) -> Vec<String> {
    let mut current = normalize_whitespace(selector).replace("> ", &CHILD_COMBINATOR.to_string());
    let mut out = Vec::new();
    while let Some(cut) = current.rfind(' ') {
        current.truncate(cut);
        let trimmed = current.trim_end().len();
        current.truncate(trimmed);
        if current.ends_with('>') {
            current.pop();
            let trimmed = current.trim_end().len();
            current.truncate(trimmed);
        }
        if current.is_empty() {
            break;
        }
        out.push(current.replace(CHILD_COMBINATOR, "> "));
    }
    out
}

/// Relax `selector` against `page` until something matches.
///
/// Intermediate selectors that no longer parse (a cut inside a pseudo-class
/// argument, for instance) are skipped.
pub fn diagnose(page: &Page, selector: &str) -> Diagnosis {
    for relaxed in relaxations(selector) {
        match page.try_select_first(&relaxed) {
            Ok(Some(found)) => {
                let children = found
                    .children()
                    .filter_map(ElementRef::wrap)
                    .map(NodeReport::of)
                    .collect();
                return Diagnosis::Found {
                    selector: relaxed,
                    node: NodeReport::of(found),
                    children,
                };
            }
            Ok(None) => {}
            Err(e) => debug!(%relaxed, error = %e, "Skipping unparseable relaxation"),
        }
    }
    Diagnosis::NothingFound
}

impl Diagnosis {
    /// HTML fragment appended to the failing query's log entry.
    pub fn render(&self) -> String {
        match self {
            Diagnosis::Found {
                selector,
                node,
                children,
            } => {
                let mut out = format!(
                    "\nRelaxed query {} matched <code>{}</code> at <code>{}</code>, its children are:",
                    bold(selector),
                    node.signature,
                    node.path
                );
                if children.is_empty() {
                    out.push_str("\n&nbsp;&nbsp;None!");
                }
                for child in children {
                    out.push_str(&format!(
                        "\n&nbsp;&nbsp;<code>{}</code> at <code>{}</code>",
                        child.signature, child.path
                    ));
                }
                out
            }
            Diagnosis::NothingFound => {
                "\nNothing was found at any relaxation of the query".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
          <div class="post">
            <h2 class="subtitle">Hello</h2>
            <p>Body</p>
          </div>
          <span class="lonely"></span>
        </body></html>
    "#;

    fn page() -> Page {
        Page::parse("https://example.com/", HTML).unwrap()
    }

    #[test]
    fn test_relaxations_keep_child_combinator_whole() {
        assert_eq!(
            relaxations("div.post  >  h1.title  span"),
            vec!["div.post > h1.title".to_string(), "div.post".to_string()]
        );
    }

    #[test]
    fn test_relaxations_step_past_space_inside_pseudo_argument() {
        assert_eq!(
            relaxations("div.post > h1.title:contains(a b)"),
            vec![
                "div.post > h1.title:contains(a".to_string(),
                "div.post".to_string()
            ]
        );
    }

    #[test]
    fn test_relaxations_of_single_token() {
        assert!(relaxations("h1.title").is_empty());
        assert!(relaxations("   ").is_empty());
    }

    #[test]
    fn test_relaxations_without_space_after_combinator() {
        assert_eq!(relaxations("main >p span"), vec!["main >p".to_string(), "main".to_string()]);
    }

    #[test]
    fn test_diagnose_skips_malformed_intermediate_selector() {
        let diagnosis = diagnose(&page(), "div.post > h1.title:contains(a b)");
        match diagnosis {
            Diagnosis::Found {
                selector,
                node,
                children,
            } => {
                assert_eq!(selector, "div.post");
                assert_eq!(node.signature, "div.post");
                assert_eq!(node.path, "html > body > div.post");
                let sigs: Vec<&str> = children.iter().map(|c| c.signature.as_str()).collect();
                assert_eq!(sigs, vec!["h2.subtitle", "p"]);
            }
            Diagnosis::NothingFound => panic!("expected a relaxed match"),
        }
    }

    #[test]
    fn test_diagnose_reports_childless_match() {
        let diagnosis = diagnose(&page(), "span.lonely b");
        assert!(diagnosis.render().contains("None!"));
    }

    #[test]
    fn test_diagnose_nothing_found() {
        let diagnosis = diagnose(&page(), "article.missing h1");
        assert_eq!(diagnosis, Diagnosis::NothingFound);
        assert!(diagnosis.render().contains("Nothing was found"));
    }
}

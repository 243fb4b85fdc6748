//! URL sanitizing pipeline.
//!
//! Podcast and episode URLs reported by clients are canonicalised before they
//! are used as identities:
//!
//! 1. surrounding whitespace is trimmed and the URL must parse as absolute;
//! 2. the host is lower-cased and any fragment is dropped;
//! 3. configured search/replace rules run in ascending priority, filtered by
//!    whether they apply to podcast or episode URLs.
//!
//! Anything that fails to parse, or that a rule rewrites to nothing, has no
//! canonical form and is dropped by callers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::CanonicalUrl;

/// Which family of URLs a rule set is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Podcast feed URLs.
    Podcast,
    /// Episode media URLs.
    Episode,
}

/// A persisted rewrite rule.
///
/// `replace` uses `regex` replacement syntax (`$1`, `${name}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizingRule {
    /// Lower values run first.
    pub priority: i32,
    /// Regular expression searched for anywhere in the URL.
    pub search: String,
    /// Replacement text for every match.
    pub replace: String,
    /// Apply the rule to podcast URLs.
    pub use_podcast: bool,
    /// Apply the rule to episode URLs.
    pub use_episode: bool,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    search: Regex,
    replace: String,
    use_podcast: bool,
    use_episode: bool,
}

impl CompiledRule {
    const fn applies_to(&self, kind: UrlKind) -> bool {
        match kind {
            UrlKind::Podcast => self.use_podcast,
            UrlKind::Episode => self.use_episode,
        }
    }
}

/// An `(original, canonical)` pair reported back to clients whose submitted
/// URL was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRewrite {
    /// URL as submitted.
    pub original: String,
    /// URL the server will use from now on.
    pub canonical: String,
}

/// Canonicalises URLs with the basic normalisation plus configured rules.
///
/// # Examples
/// ```
/// use podsync::domain::{UrlKind, UrlSanitizer};
///
/// let sanitizer = UrlSanitizer::default();
/// let url = sanitizer
///     .sanitize(" http://Example.COM/feed.xml#top ", UrlKind::Podcast)
///     .expect("valid url");
/// assert_eq!(url.as_str(), "http://example.com/feed.xml");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrlSanitizer {
    rules: Vec<CompiledRule>,
}

impl UrlSanitizer {
    /// Compile `rules`, ordering them by priority.
    ///
    /// Rules whose pattern does not compile are skipped with a warning so one
    /// bad row cannot take the write path down.
    #[must_use]
    pub fn new(mut rules: Vec<SanitizingRule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);
        let compiled = rules
            .into_iter()
            .filter_map(|rule| match Regex::new(&rule.search) {
                Ok(search) => Some(CompiledRule {
                    search,
                    replace: rule.replace,
                    use_podcast: rule.use_podcast,
                    use_episode: rule.use_episode,
                }),
                Err(error) => {
                    warn!(pattern = %rule.search, %error, "skipping invalid sanitizing rule");
                    None
                }
            })
            .collect();
        Self { rules: compiled }
    }

    /// Canonical form of `raw`, or `None` when it has none.
    #[must_use]
    pub fn sanitize(&self, raw: &str, kind: UrlKind) -> Option<CanonicalUrl> {
        let mut url = basic_sanitize(raw)?;
        for rule in self.rules.iter().filter(|rule| rule.applies_to(kind)) {
            url = rule
                .search
                .replace_all(&url, rule.replace.as_str())
                .into_owned();
        }
        CanonicalUrl::new(url.trim()).ok()
    }

    /// Sanitize `raw`, recording an [`UrlRewrite`] when the result differs.
    ///
    /// Inputs without a canonical form are recorded with an empty canonical
    /// URL so the client learns they were discarded.
    pub fn sanitize_tracked(
        &self,
        raw: &str,
        kind: UrlKind,
        rewrites: &mut Vec<UrlRewrite>,
    ) -> Option<CanonicalUrl> {
        let sanitized = self.sanitize(raw, kind);
        let canonical = sanitized.as_ref().map_or("", CanonicalUrl::as_str);
        if canonical != raw {
            let rewrite = UrlRewrite {
                original: raw.to_owned(),
                canonical: canonical.to_owned(),
            };
            if !rewrites.contains(&rewrite) {
                rewrites.push(rewrite);
            }
        }
        sanitized
    }
}

/// Parse, lower-case the host, and drop the fragment.
fn basic_sanitize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = Url::parse(trimmed).ok()?;
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host && url.set_host(Some(&lowered)).is_err() {
            return None;
        }
    }
    url.set_fragment(None);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::{fixture, rstest};

    fn rule(priority: i32, search: &str, replace: &str) -> SanitizingRule {
        SanitizingRule {
            priority,
            search: search.to_owned(),
            replace: replace.to_owned(),
            use_podcast: true,
            use_episode: false,
        }
    }

    #[fixture]
    fn feedburner_sanitizer() -> UrlSanitizer {
        UrlSanitizer::new(vec![
            rule(2, r"\?format=xml$", ""),
            rule(1, r"^http://feeds2\.", "http://feeds."),
        ])
    }

    #[rstest]
    #[case("http://Example.COM/Feed", "http://example.com/Feed")]
    #[case("https://example.com/a#frag", "https://example.com/a")]
    #[case("  http://example.com/x  ", "http://example.com/x")]
    fn basic_normalisation(#[case] raw: &str, #[case] expected: &str) {
        let url = UrlSanitizer::default()
            .sanitize(raw, UrlKind::Podcast)
            .expect("valid url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("not a url")]
    fn unparsable_input_has_no_canonical_form(#[case] raw: &str) {
        assert!(UrlSanitizer::default().sanitize(raw, UrlKind::Podcast).is_none());
    }

    #[rstest]
    fn rules_apply_in_priority_order(feedburner_sanitizer: UrlSanitizer) {
        let url = feedburner_sanitizer
            .sanitize("http://feeds2.example.com/show?format=xml", UrlKind::Podcast)
            .expect("valid url");
        assert_eq!(url.as_str(), "http://feeds.example.com/show");
    }

    #[rstest]
    fn podcast_rules_do_not_touch_episode_urls(feedburner_sanitizer: UrlSanitizer) {
        let url = feedburner_sanitizer
            .sanitize("http://feeds2.example.com/ep.mp3", UrlKind::Episode)
            .expect("valid url");
        assert_eq!(url.as_str(), "http://feeds2.example.com/ep.mp3");
    }

    #[rstest]
    fn rules_that_erase_the_url_drop_it() {
        let sanitizer = UrlSanitizer::new(vec![rule(1, r"^.*spam.*$", "")]);
        assert!(sanitizer
            .sanitize("http://spam.example.com/feed", UrlKind::Podcast)
            .is_none());
    }

    #[rstest]
    fn invalid_rules_are_skipped() {
        let sanitizer = UrlSanitizer::new(vec![rule(1, "(unclosed", "")]);
        let url = sanitizer
            .sanitize("http://example.com/feed", UrlKind::Podcast)
            .expect("valid url");
        assert_eq!(url.as_str(), "http://example.com/feed");
    }

    #[rstest]
    fn tracked_sanitizing_records_each_rewrite_once() {
        let sanitizer = UrlSanitizer::default();
        let mut rewrites = Vec::new();
        for _ in 0..2 {
            sanitizer.sanitize_tracked("http://EXAMPLE.com/f", UrlKind::Podcast, &mut rewrites);
        }
        sanitizer.sanitize_tracked("http://example.com/g", UrlKind::Podcast, &mut rewrites);

        assert_eq!(
            rewrites,
            vec![UrlRewrite {
                original: "http://EXAMPLE.com/f".to_owned(),
                canonical: "http://example.com/f".to_owned(),
            }]
        );
    }
}

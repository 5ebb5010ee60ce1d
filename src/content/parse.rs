//! Splitting raw model output into article body and meta description.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum length, in characters, of a synthesized meta description.
pub const FALLBACK_META_MAX_CHARS: usize = 155;

/// Article and meta description extracted from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub article_html: String,
    pub meta_description: String,
    /// False when the meta description was synthesized from the article.
    pub meta_from_marker: bool,
}

fn meta_marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)META_DESC\s*:(.*)$").expect("meta marker pattern is valid"))
}

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<.*?>").expect("html tag pattern is valid"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Synthesizes a meta description from article HTML: tags stripped,
/// whitespace collapsed, truncated to [`FALLBACK_META_MAX_CHARS`] characters.
pub fn fallback_meta_description(article_html: &str) -> String {
    let text = html_tag_pattern().replace_all(article_html, " ");
    let text = whitespace_pattern().replace_all(&text, " ");
    text.trim().chars().take(FALLBACK_META_MAX_CHARS).collect()
}

/// Parses a raw model response.
///
/// The first `META_DESC:` marker (any case) splits the text: everything
/// before it is the article, everything after it the meta description. With
/// no marker the whole response is the article and the meta description is
/// synthesized. The article may come back empty; callers treat that as a
/// failed attempt.
pub fn parse_response(raw: &str) -> GenerationResult {
    let raw = raw.trim();

    match meta_marker_pattern().captures(raw) {
        Some(captures) => {
            let marker_start = captures.get(0).map_or(raw.len(), |m| m.start());
            let meta = captures.get(1).map_or("", |m| m.as_str());
            GenerationResult {
                article_html: raw[..marker_start].trim().to_string(),
                meta_description: meta.trim().to_string(),
                meta_from_marker: true,
            }
        }
        None => GenerationResult {
            article_html: raw.to_string(),
            meta_description: fallback_meta_description(raw),
            meta_from_marker: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_marker() {
        let raw = "<p>Intro</p>\n<h2>FAQ</h2>\n<h2>Conclusion</h2>\n\nMETA_DESC: Learn everything about mats.\n";
        let parsed = parse_response(raw);

        assert_eq!(
            parsed.article_html,
            "<p>Intro</p>\n<h2>FAQ</h2>\n<h2>Conclusion</h2>"
        );
        assert_eq!(parsed.meta_description, "Learn everything about mats.");
        assert!(parsed.meta_from_marker);
    }

    #[test]
    fn test_parse_marker_case_insensitive_same_boundary() {
        let variants = [
            "<p>Body</p>\n\nMETA_DESC: Summary here",
            "<p>Body</p>\n\nmeta_desc: Summary here",
            "<p>Body</p>\n\nMeta_Desc   :   Summary here",
        ];
        for raw in variants {
            let parsed = parse_response(raw);
            assert_eq!(parsed.article_html, "<p>Body</p>", "input: {raw}");
            assert_eq!(parsed.meta_description, "Summary here", "input: {raw}");
        }
    }

    #[test]
    fn test_parse_meta_keeps_trailing_lines() {
        let parsed = parse_response("<p>A</p>\n\nMETA_DESC: first line\nsecond line");
        assert_eq!(parsed.meta_description, "first line\nsecond line");
    }

    #[test]
    fn test_parse_without_marker_synthesizes_meta() {
        let raw = "<p>Yoga   mats <strong>matter</strong>.</p>\n<p>Pick well.</p>";
        let parsed = parse_response(raw);

        assert_eq!(parsed.article_html, raw);
        assert_eq!(parsed.meta_description, "Yoga mats matter . Pick well.");
        assert!(!parsed.meta_from_marker);
    }

    #[test]
    fn test_fallback_meta_truncates_to_limit() {
        let long = format!("<p>{}</p>", "é".repeat(400));
        let meta = fallback_meta_description(&long);
        assert_eq!(meta.chars().count(), FALLBACK_META_MAX_CHARS);
        assert!(meta.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_parse_marker_only_gives_empty_article() {
        let parsed = parse_response("META_DESC: nothing else");
        assert!(parsed.article_html.is_empty());
        assert_eq!(parsed.meta_description, "nothing else");
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed = parse_response("   \n ");
        assert!(parsed.article_html.is_empty());
        assert!(parsed.meta_description.is_empty());
    }
}

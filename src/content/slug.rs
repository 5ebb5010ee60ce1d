//! URL slug derivation for article titles.

use unicode_normalization::UnicodeNormalization;

/// Slug used when a title has no usable characters.
pub const DEFAULT_SLUG: &str = "article";

const SEPARATOR: char = '-';

/// Derives a URL slug from a title.
///
/// Accented characters are decomposed and reduced to ASCII, every run of
/// non-alphanumeric characters becomes a single `-`, separators are trimmed
/// from both ends and the result is lowercased.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.nfkd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

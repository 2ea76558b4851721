//! URL slug generation
//!
//! Slugs are lowercase ASCII alphanumerics separated by single hyphens.
//! Common Latin accents are folded first so "Création de site" becomes
//! `creation-de-site`.

use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// Longest slug accepted from input or produced from a title
pub const MAX_SLUG_LEN: usize = 120;

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

/// Generate a slug from a title or name.
///
/// May return an empty string when the input has no usable characters.
pub fn generate_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.to_lowercase().chars() {
        let piece: Option<String> = if c.is_ascii_alphanumeric() {
            Some(c.to_string())
        } else {
            fold_accent(c).map(str::to_string)
        };

        match piece {
            Some(piece) => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push_str(&piece);
            }
            None => pending_hyphen = true,
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Whether a user-supplied slug is already in canonical form
pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LEN && SLUG_RE.is_match(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug_basic() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Web   Design -- 2024 "), "web-design-2024");
        assert_eq!(generate_slug("C'est l'été"), "c-est-l-ete");
        assert_eq!(generate_slug("Création de site e-commerce"), "creation-de-site-e-commerce");
    }

    #[test]
    fn test_generate_slug_empty() {
        assert_eq!(generate_slug(""), "");
        assert_eq!(generate_slug("!!! ???"), "");
        assert_eq!(generate_slug("日本語"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug(""));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn generated_slugs_are_valid_or_empty(input in "\\PC{0,200}") {
                let slug = generate_slug(&input);
                prop_assert!(slug.is_empty() || is_valid_slug(&slug), "bad slug {:?}", slug);
            }

            #[test]
            fn generate_slug_is_idempotent(input in "[a-zA-Z0-9 éèàç_-]{0,80}") {
                let once = generate_slug(&input);
                prop_assert_eq!(generate_slug(&once), once.clone());
            }
        }
    }
}

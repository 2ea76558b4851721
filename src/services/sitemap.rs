//! sitemap.xml generation
//!
//! Front-end routes: `/{locale}`, `/{locale}/blog`, `/{locale}/projects`,
//! `/{locale}/blog/{slug}` and `/{locale}/projects/{slug}`.

use crate::models::{Blog, Language, Project};
use chrono::{DateTime, Utc};
use std::fmt::Write;

struct UrlEntry {
    loc: String,
    lastmod: Option<DateTime<Utc>>,
}

/// Escape the five XML special characters
fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the sitemap of the public site.
///
/// `blogs` and `projects` must already be restricted to published content.
pub fn build_sitemap(base_url: &str, languages: &[Language], blogs: &[Blog], projects: &[Project]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut entries = Vec::new();

    for language in languages {
        for path in ["", "/blog", "/projects"] {
            entries.push(UrlEntry {
                loc: format!("{}/{}{}", base, language.code, path),
                lastmod: None,
            });
        }
    }
    entries.extend(blogs.iter().map(|blog| UrlEntry {
        loc: format!("{}/{}/blog/{}", base, blog.locale, blog.slug),
        lastmod: Some(blog.updated_at),
    }));
    entries.extend(projects.iter().map(|project| UrlEntry {
        loc: format!("{}/{}/projects/{}", base, project.locale, project.slug),
        lastmod: Some(project.updated_at),
    }));

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        // Writing to a String cannot fail
        let _ = write!(xml, "  <url><loc>{}</loc>", xml_escape(&entry.loc));
        if let Some(lastmod) = entry.lastmod {
            let _ = write!(xml, "<lastmod>{}</lastmod>", lastmod.format("%Y-%m-%d"));
        }
        xml.push_str("</url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublishStatus;
    use chrono::TimeZone;

    fn language(code: &str) -> Language {
        let now = Utc::now();
        Language {
            id: 1,
            code: code.to_string(),
            name: code.to_uppercase(),
            is_default: code == "fr",
            created_at: now,
        }
    }

    #[test]
    fn test_sitemap_contents() {
        let updated = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let blog = Blog {
            id: 1,
            slug: "bonjour".to_string(),
            locale: "fr".to_string(),
            title: "Bonjour".to_string(),
            excerpt: None,
            content: String::new(),
            content_html: String::new(),
            cover_image: None,
            category_id: None,
            author_id: None,
            status: PublishStatus::Published,
            published_at: Some(updated),
            created_at: updated,
            updated_at: updated,
        };

        let xml = build_sitemap("https://agency.example/", &[language("fr"), language("en")], &[blog], &[]);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://agency.example/fr</loc>"));
        assert!(xml.contains("<loc>https://agency.example/en/projects</loc>"));
        assert!(xml.contains(
            "<url><loc>https://agency.example/fr/blog/bonjour</loc><lastmod>2026-02-01</lastmod></url>"
        ));
        assert_eq!(xml.matches("<url>").count(), 7);
    }

    #[test]
    fn test_escape() {
        assert_eq!(xml_escape("a&b<c>"), "a&amp;b&lt;c&gt;");
    }
}

//! Visible-text extraction from fetched HTML.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Website links on a company profile's About page, most specific first.
static WEBSITE_LINKS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "a[data-tracking-control-name=\"about_website\"]",
        "dd a[href^=\"http\"]",
        "a.link-without-visited-state[href^=\"http\"]",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Human-visible text of a document, one block per line.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    collect_text(root, &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !line.is_empty() {
                    lines.push(line);
                }
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}

/// Find the company's own website on its profile About page.
///
/// Profile links often go through a redirect endpoint carrying the real
/// target in a `url` query parameter; those are unwrapped.
pub fn find_website(html: &str, profile_host: &str) -> Option<String> {
    let document = Html::parse_document(html);
    WEBSITE_LINKS.iter().find_map(|selector| {
        document
            .select(selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(unwrap_redirect)
            .find(|url| url.host_str().is_some_and(|host| !host.ends_with(profile_host)))
            .map(|url| url.to_string())
    })
}

fn unwrap_redirect(href: &str) -> Option<Url> {
    let url = Url::parse(href).ok()?;
    if url.path().contains("/redir/") {
        let target = url
            .query_pairs()
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())?;
        return Url::parse(&target).ok();
    }
    Some(url)
}

/// The About page of a company profile URL.
pub fn about_url(company_url: &str) -> Option<String> {
    let mut url = Url::parse(company_url).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    let segments: Vec<String> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let path = match segments.as_slice() {
        [kind, slug, ..] if kind == "company" || kind == "school" => {
            format!("/{}/{}/about/", kind, slug)
        }
        _ => format!("/{}/about/", segments.join("/")),
    };
    url.set_path(&path);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_skips_scripts() {
        let html = r#"<html><head><title>x</title></head><body>
            <nav>Home</nav>
            <script>var tracking = 1;</script>
            <p>Acme builds   rockets.</p>
            <style>p { color: red }</style>
        </body></html>"#;
        assert_eq!(visible_text(html), "Home\nAcme builds rockets.");
    }

    #[test]
    fn test_find_website_unwraps_redirects() {
        let html = r#"<dl>
            <dd><a href="https://www.linkedin.com/company/acme/">Profile</a></dd>
            <dd><a href="https://www.linkedin.com/redir/redirect?url=https%3A%2F%2Facme.test%2F&urlhash=x">acme.test</a></dd>
        </dl>"#;
        assert_eq!(
            find_website(html, "linkedin.com").as_deref(),
            Some("https://acme.test/")
        );
        assert_eq!(find_website("<p>nothing</p>", "linkedin.com"), None);
    }

    #[test]
    fn test_about_url() {
        assert_eq!(
            about_url("https://www.linkedin.com/company/acme/life/?trk=x").as_deref(),
            Some("https://www.linkedin.com/company/acme/about/")
        );
        assert_eq!(
            about_url("https://www.linkedin.com/company/acme").as_deref(),
            Some("https://www.linkedin.com/company/acme/about/")
        );
        assert_eq!(
            about_url("https://www.linkedin.com/company/acme/about/").as_deref(),
            Some("https://www.linkedin.com/company/acme/about/")
        );
    }
}

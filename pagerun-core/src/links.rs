use std::cell::RefCell;

use lol_html::{RewriteStrSettings, element, rewrite_str};

/// Marks a link the builder must not follow.
pub const NO_BUILD_ATTRIBUTE: &str = "data-no-build";

/// A link-bearing attribute found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundLink {
    /// Lowercase tag name, e.g. `a` or `img`
    pub tag: String,
    /// `href` or `src`
    pub attribute: &'static str,
    pub value: String,
    pub no_build: bool,
}

impl FoundLink {
    pub fn is_anchor(&self) -> bool {
        self.tag == "a" && self.attribute == "href"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Keep,
    Replace(String),
}

/// Run `visit` over every `href` and `src` attribute in `html`, applying the
/// returned action in place.
pub fn rewrite_links<F>(html: &str, visit: F) -> Result<String, String>
where
    F: FnMut(&FoundLink) -> LinkAction,
{
    let visit = RefCell::new(visit);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("[href]", |el| {
                    if let Some(value) = el.get_attribute("href") {
                        let link = FoundLink {
                            tag: el.tag_name(),
                            attribute: "href",
                            value,
                            no_build: el.has_attribute(NO_BUILD_ATTRIBUTE),
                        };
                        let mut visit = visit.borrow_mut();
                        if let LinkAction::Replace(new) = (&mut *visit)(&link) {
                            el.set_attribute("href", &new)?;
                        }
                    }
                    Ok(())
                }),
                element!("[src]", |el| {
                    if let Some(value) = el.get_attribute("src") {
                        let link = FoundLink {
                            tag: el.tag_name(),
                            attribute: "src",
                            value,
                            no_build: el.has_attribute(NO_BUILD_ATTRIBUTE),
                        };
                        let mut visit = visit.borrow_mut();
                        if let LinkAction::Replace(new) = (&mut *visit)(&link) {
                            el.set_attribute("src", &new)?;
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| err.to_string())
}

/// Every `href` and `src` attribute in `html`, in document order.
pub fn extract_links(html: &str) -> Result<Vec<FoundLink>, String> {
    let mut links = Vec::new();
    rewrite_links(html, |link| {
        links.push(link.clone());
        LinkAction::Keep
    })?;
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><link rel="stylesheet" href="style.css"></head>
<body>
<a href="about.tsx?x=1">About</a>
<a href="https://example.com">Out</a>
<a href="live.tsx?q=now" data-no-build>Live</a>
<img src="/img/logo.png" alt="">
</body></html>"#;

    #[test]
    fn test_extract_links_in_order() {
        let links = extract_links(PAGE).unwrap();
        let values: Vec<_> = links.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(
            values,
            vec![
                "style.css",
                "about.tsx?x=1",
                "https://example.com",
                "live.tsx?q=now",
                "/img/logo.png"
            ]
        );

        assert!(!links[0].is_anchor());
        assert!(links[1].is_anchor());
        assert!(links[3].no_build);
        assert_eq!(links[4].tag, "img");
        assert_eq!(links[4].attribute, "src");
    }

    #[test]
    fn test_rewrite_replaces_only_selected_links() {
        let html = rewrite_links(PAGE, |link| {
            if link.value == "about.tsx?x=1" {
                LinkAction::Replace("about[x=1].html".into())
            } else {
                LinkAction::Keep
            }
        })
        .unwrap();

        assert!(html.contains(r#"<a href="about[x=1].html">About</a>"#));
        assert!(html.contains(r#"href="https://example.com""#));
        assert!(html.contains(r#"src="/img/logo.png""#));
    }

    #[test]
    fn test_document_without_links_is_untouched() {
        let html = "<p>plain &amp; simple</p>";
        assert_eq!(rewrite_links(html, |_| LinkAction::Keep).unwrap(), html);
    }
}

//! Mapping between template hrefs and the file names they are built to.
//!
//! All paths here are `/`-separated site paths, not filesystem paths. A page
//! variant with query parameters is written to a file that carries its sorted
//! parameters in brackets, so `about.tsx?y=2&x=1` and `about.tsx?x=1&y=2` both
//! land in `about[x=1,y=2].html`.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::form_urlencoded;

use crate::config::TemplateConfig;

/// Characters that cannot appear literally inside a bracketed parameter list.
const PARAM_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b',')
    .add(b'/')
    .add(b'=')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']');

/// Characters a request path would decode or cut short, escaped when an
/// output file name is written into a link.
const FILE_HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?');

const STATIC_EXTENSION: &str = ".html";

/// Converts between template hrefs and static output paths.
#[derive(Debug, Clone)]
pub struct PathMapper {
    suffix: String,
    index_file: String,
}

impl PathMapper {
    pub fn new(template: &TemplateConfig) -> Self {
        Self {
            suffix: format!(".{}", template.extension),
            index_file: template.index_file(),
        }
    }

    /// Does the path part of `href` point at a template module?
    pub fn is_template_href(&self, href: &str) -> bool {
        let (path, _) = split_suffix(href);
        path.is_empty() || path.ends_with('/') || path.ends_with(&self.suffix)
    }

    /// Build-time file name for `href`.
    ///
    /// A trailing `/` means the directory's index page. Query parameters are
    /// sorted into a bracket suffix; the fragment is kept only when
    /// `include_fragment` is set.
    pub fn to_static_path(&self, href: &str, include_fragment: bool) -> String {
        let (rest, fragment) = split_fragment(href);
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut path = path.to_string();
        if path.is_empty() || path.ends_with('/') {
            path.push_str(&self.index_file);
        }

        let mut static_path = match path.strip_suffix(&self.suffix) {
            Some(stem) => {
                let params = sorted_params(query);
                if params.is_empty() {
                    format!("{stem}{STATIC_EXTENSION}")
                } else {
                    format!("{stem}[{}]{STATIC_EXTENSION}", encode_params(&params))
                }
            }
            None => path,
        };

        if include_fragment {
            if let Some(fragment) = fragment {
                static_path.push('#');
                static_path.push_str(fragment);
            }
        }
        static_path
    }

    /// Template href answering a static path; the inverse of [`Self::to_static_path`].
    pub fn to_source_path(&self, static_path: &str) -> String {
        let (path, _) = split_suffix(static_path);

        if path.is_empty() || path.ends_with('/') {
            let dir = if path.is_empty() { "/" } else { path };
            return format!("{dir}{}", self.index_file);
        }

        let Some(stem) = path.strip_suffix(STATIC_EXTENSION) else {
            return path.to_string();
        };

        match split_bracket_params(stem) {
            Some((base, params)) if !params.is_empty() => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                for (key, value) in &params {
                    query.append_pair(key, value);
                }
                format!("{base}{}?{}", self.suffix, query.finish())
            }
            Some((base, _)) => format!("{base}{}", self.suffix),
            None => format!("{stem}{}", self.suffix),
        }
    }
}

/// Link text that a browser resolves to the output file `static_path`.
///
/// Bracket parameters keep their escapes in the file name, so
/// `about[q=a%20b].html` is linked as `about[q=a%2520b].html`. The
/// `?query#fragment` tail is left as is.
pub fn static_href(static_path: &str) -> String {
    let (path, suffix) = split_suffix(static_path);
    format!("{}{suffix}", utf8_percent_encode(path, FILE_HREF_ESCAPE))
}

/// Output file name a request path points at; the inverse of [`static_href`].
pub fn decode_static_href(href: &str) -> String {
    let (path, _) = split_suffix(href);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Query parameters of `href`, if it has any.
pub fn query_params(href: &str) -> Vec<(String, String)> {
    let (rest, _) = split_fragment(href);
    match rest.split_once('?') {
        Some((_, query)) => form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
        None => Vec::new(),
    }
}

/// Resolve `target` against the directory `base_dir`.
///
/// A leading `/` makes `target` absolute from the site root. `.` and `..`
/// segments are collapsed and never climb above the root. Query string,
/// fragment and a trailing `/` survive.
pub fn get_absolute_path(base_dir: &str, target: &str) -> String {
    let (path, suffix) = split_suffix(target);

    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), path)
    };

    let trailing = path.is_empty()
        || path.ends_with('/')
        || path == "."
        || path == ".."
        || path.ends_with("/.")
        || path.ends_with("/..");

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut absolute = format!("/{}", segments.join("/"));
    if trailing && absolute != "/" {
        absolute.push('/');
    }
    absolute.push_str(suffix);
    absolute
}

/// Relative path from the directory `from_dir` to the site path `to`.
pub fn get_relative_path(from_dir: &str, to: &str) -> String {
    let (path, suffix) = split_suffix(to);

    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let target: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend_from_slice(&target[common..]);

    let mut relative = parts.join("/");
    if relative.is_empty() {
        relative.push('.');
    }
    if path.ends_with('/') {
        relative.push('/');
    }
    relative.push_str(suffix);
    relative
}

/// Directory part of a site path: `/docs/a.tsx` gives `/docs`, `/a.tsx` gives `/`.
pub fn parent_dir(site_path: &str) -> &str {
    let (path, _) = split_suffix(site_path);
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// True for links that point inside the site.
///
/// URLs with a scheme (`http:`, `mailto:`, `data:`, ...), protocol-relative
/// URLs, bare fragments and empty values are not local.
pub fn is_local_link(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("//") {
        return false;
    }

    let end = href.find(['/', '?', '#']).unwrap_or(href.len());
    match href[..end].find(':') {
        Some(i) => {
            let scheme = &href[..i];
            let is_scheme = scheme
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            !is_scheme
        }
        None => true,
    }
}

/// Split `href` into its path and the `?query#fragment` tail.
pub fn split_suffix(href: &str) -> (&str, &str) {
    match href.find(['?', '#']) {
        Some(i) => (&href[..i], &href[i..]),
        None => (href, ""),
    }
}

fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (href, None),
    }
}

fn sorted_params(query: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    params.sort();
    params.dedup();
    params
}

fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, PARAM_ESCAPE),
                utf8_percent_encode(value, PARAM_ESCAPE)
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn split_bracket_params(stem: &str) -> Option<(&str, Vec<(String, String)>)> {
    let inner_end = stem.strip_suffix(']')?;
    let open = inner_end.rfind('[')?;
    let base = &inner_end[..open];
    let inner = &inner_end[open + 1..];

    let params = inner
        .split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_str(key).decode_utf8_lossy().into_owned(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            )
        })
        .collect();

    Some((base, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PathMapper {
        PathMapper::new(&TemplateConfig::default())
    }

    #[test]
    fn test_plain_template_maps_to_html() {
        assert_eq!(mapper().to_static_path("/about.tsx", false), "/about.html");
        assert_eq!(mapper().to_static_path("docs/intro.tsx", false), "docs/intro.html");
    }

    #[test]
    fn test_trailing_slash_means_index() {
        assert_eq!(mapper().to_static_path("/", false), "/index.html");
        assert_eq!(mapper().to_static_path("/docs/", false), "/docs/index.html");
    }

    #[test]
    fn test_query_order_does_not_change_file_name() {
        let m = mapper();
        let a = m.to_static_path("/about.tsx?y=3&x=2", false);
        let b = m.to_static_path("/about.tsx?x=2&y=3", false);
        assert_eq!(a, b);
        assert_eq!(a, "/about[x=2,y=3].html");
    }

    #[test]
    fn test_empty_query_is_plain_page() {
        assert_eq!(mapper().to_static_path("/about.tsx?", false), "/about.html");
    }

    #[test]
    fn test_fragment_kept_only_on_request() {
        let m = mapper();
        assert_eq!(m.to_static_path("/about.tsx?x=1#team", false), "/about[x=1].html");
        assert_eq!(m.to_static_path("/about.tsx?x=1#team", true), "/about[x=1].html#team");
        assert_eq!(m.to_static_path("/img/logo.png#x", true), "/img/logo.png#x");
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        let path = mapper().to_static_path("/search.tsx?q=a%2Cb%3Dc&path=%2Fetc", false);
        assert_eq!(path, "/search[path=%2Fetc,q=a%2Cb%3Dc].html");
        assert_eq!(
            mapper().to_source_path(&path),
            "/search.tsx?path=%2Fetc&q=a%2Cb%3Dc"
        );
    }

    #[test]
    fn test_non_template_href_is_unchanged() {
        assert_eq!(mapper().to_static_path("/style.css?v=3", false), "/style.css");
    }

    #[test]
    fn test_to_source_path() {
        let m = mapper();
        assert_eq!(m.to_source_path("/"), "/index.tsx");
        assert_eq!(m.to_source_path(""), "/index.tsx");
        assert_eq!(m.to_source_path("/docs/"), "/docs/index.tsx");
        assert_eq!(m.to_source_path("/about.html"), "/about.tsx");
        assert_eq!(m.to_source_path("/about[x=1,y=2].html"), "/about.tsx?x=1&y=2");
        assert_eq!(m.to_source_path("/logo.png"), "/logo.png");
    }

    #[test]
    fn test_source_path_inverts_static_path() {
        let m = mapper();
        let static_path = m.to_static_path("/about.tsx?name=Alice&age=30", false);
        assert_eq!(m.to_source_path(&static_path), "/about.tsx?age=30&name=Alice");
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(get_absolute_path("/docs", "intro.tsx"), "/docs/intro.tsx");
        assert_eq!(get_absolute_path("/docs/", "../about.tsx?x=1"), "/about.tsx?x=1");
        assert_eq!(get_absolute_path("/docs", "/about.tsx"), "/about.tsx");
        assert_eq!(get_absolute_path("/", "../../a.tsx"), "/a.tsx");
        assert_eq!(get_absolute_path("/docs", "./guide/"), "/docs/guide/");
        assert_eq!(get_absolute_path("/docs", ".."), "/");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(get_relative_path("/", "/about.html"), "about.html");
        assert_eq!(get_relative_path("/docs", "/about.html"), "../about.html");
        assert_eq!(get_relative_path("/docs", "/docs/a/b.html#x"), "a/b.html#x");
        assert_eq!(get_relative_path("/a/b", "/a/c/d.html"), "../c/d.html");
        assert_eq!(get_relative_path("/docs", "/docs/"), "./");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/about.tsx"), "/");
        assert_eq!(parent_dir("/docs/intro.tsx?x=1"), "/docs");
    }

    #[test]
    fn test_local_links() {
        assert!(is_local_link("about.tsx"));
        assert!(is_local_link("/img/logo.png"));
        assert!(is_local_link("../a.tsx?next=http://x"));
        assert!(!is_local_link("https://example.com/"));
        assert!(!is_local_link("http://example.com/a.tsx"));
        assert!(!is_local_link("//cdn.example.com/a.js"));
        assert!(!is_local_link("mailto:me@example.com"));
        assert!(!is_local_link("#top"));
        assert!(!is_local_link(""));
    }

    #[test]
    fn test_query_params() {
        assert_eq!(
            query_params("/about.tsx?name=Alice#x"),
            vec![("name".to_string(), "Alice".to_string())]
        );
        assert!(query_params("/about.tsx").is_empty());
    }

    #[test]
    fn test_static_href_survives_request_decoding() {
        let file = mapper().to_static_path("/about.tsx?name=John%20Doe", false);
        assert_eq!(file, "/about[name=John%20Doe].html");

        let href = static_href(&file);
        assert_eq!(href, "/about[name=John%2520Doe].html");
        assert_eq!(decode_static_href(&href), file);
    }

    #[test]
    fn test_static_href_keeps_fragment() {
        assert_eq!(static_href("docs/a[x=1].html#top"), "docs/a[x=1].html#top");
        assert_eq!(static_href("my page.html"), "my%20page.html");
    }
}

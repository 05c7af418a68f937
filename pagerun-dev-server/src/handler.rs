use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use pagerun_core::{
    PathMapper, RenderError, RenderRequest, RenderResult, TemplateConfig,
    path::{decode_static_href, get_absolute_path, query_params, split_suffix},
};
use url::form_urlencoded;

use crate::livereload::RELOAD_SCRIPT;
use crate::server::AppState;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug)]
pub(crate) enum HandlerError {
    NotFound,
    Internal(String),
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => HandlerError::NotFound,
            _ => HandlerError::Internal(err.to_string()),
        }
    }
}

impl From<RenderError> for HandlerError {
    fn from(err: RenderError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            HandlerError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

/// What a request path resolves to.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// Raw file from the source tree
    Asset(PathBuf),
    /// Template module, with parameters carried in a static file name
    Page {
        template: PathBuf,
        params: BTreeMap<String, String>,
    },
}

/// `request_path` is the raw URI path. It is decoded once, the way a static
/// file server would, so links written for built file names resolve here too.
pub(crate) fn resolve_route(
    root: &Path,
    template: &TemplateConfig,
    mapper: &PathMapper,
    request_path: &str,
) -> Route {
    let mut path = get_absolute_path("/", &decode_static_href(request_path));
    let on_disk = |p: &str| root.join(p.trim_start_matches('/'));

    if path.ends_with('/') || on_disk(&path).is_dir() {
        path = format!("{}/{}", path.trim_end_matches('/'), template.index_file());
    }

    let extension = Path::new(&path)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());

    let source = match extension.as_deref() {
        Some("html") => mapper.to_source_path(&path),
        Some(ext) if ext == template.extension => path,
        Some(_) => return Route::Asset(on_disk(&path)),
        None if on_disk(&path).is_file() => return Route::Asset(on_disk(&path)),
        None => format!("{path}.{}", template.extension),
    };

    let (template_path, _) = split_suffix(&source);
    Route::Page {
        template: on_disk(template_path),
        params: query_params(&source).into_iter().collect(),
    }
}

pub(crate) async fn handle_request(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    match respond(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                HandlerError::NotFound => tracing::debug!(%method, %uri, "not found"),
                HandlerError::Internal(message) => {
                    tracing::error!(%method, %uri, error = %message, "request failed")
                }
            }
            e.into_response()
        }
    }
}

async fn respond(state: &AppState, request: Request) -> Result<Response, HandlerError> {
    let (parts, body) = request.into_parts();
    match resolve_route(&state.root, &state.template, &state.mapper, parts.uri.path()) {
        Route::Asset(file) => serve_asset(&file).await,
        Route::Page { template, mut params } => {
            if !template.is_file() {
                return Err(HandlerError::NotFound);
            }

            if let Some(query) = parts.uri.query() {
                params.extend(form_urlencoded::parse(query.as_bytes()).into_owned());
            }

            let body = to_bytes(body, usize::MAX)
                .await
                .map_err(|e| HandlerError::Internal(e.to_string()))?;

            let request = RenderRequest {
                method: parts.method.to_string(),
                url: full_url(&parts.headers, &parts.uri),
                body: String::from_utf8_lossy(&body).into_owned(),
                data: params,
            };

            tracing::debug!(method = %request.method, url = %request.url, "render");
            let result = state.renderer.render(&template, &request).await?;
            Ok(assemble_response(result, state.auto_reload))
        }
    }
}

async fn serve_asset(file: &Path) -> Result<Response, HandlerError> {
    let contents = tokio::fs::read(file).await?;
    let mime = mime_guess::from_path(file).first_or_octet_stream();

    let mut response = Response::new(Body::from(contents));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

fn full_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}{uri}")
}

/// Turn a render into an HTTP response.
///
/// Diagnostics are shown above the body, never instead of it.
pub(crate) fn assemble_response(result: RenderResult, auto_reload: bool) -> Response {
    let mut body = String::new();
    if result.has_diagnostics() {
        tracing::warn!("render diagnostics:\n{}", result.diagnostics.trim_end());
        body.push_str(&error_banner(&result.diagnostics));
    }
    body.push_str(&result.output);
    if auto_reload {
        body.push_str(RELOAD_SCRIPT);
    }

    let meta = result.response.unwrap_or_default();
    let mut response = Response::new(Body::from(body));

    *response.status_mut() = match StatusCode::from_u16(meta.status_or_default()) {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(status = ?meta.status, "template set an invalid status");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if response.status().canonical_reason() != Some(meta.status_text_or_default()) {
        tracing::debug!(
            status_text = meta.status_text_or_default(),
            "custom status text is not sent on the wire"
        );
    }

    if meta.headers.is_empty() {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
    }
    for (name, value) in &meta.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "template set an invalid header"),
        }
    }

    response
}

fn error_banner(diagnostics: &str) -> String {
    format!(
        "<div style=\"white-space: pre-wrap; font-family: monospace; font-size: 16px; \
         background: #b00020; color: #fff; padding: 1em; margin: 0 0 1em;\">render error\n{}</div>",
        html_escape::encode_text(diagnostics)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagerun_core::ScriptResponse;

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }

    fn result(output: &str, diagnostics: &str, response: Option<ScriptResponse>) -> RenderResult {
        RenderResult {
            output: output.to_string(),
            diagnostics: diagnostics.to_string(),
            response,
            exit_status: exit_status(0),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_without_metadata() {
        let response = assemble_response(result("<p>hi</p>", "", None), false);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], HTML_CONTENT_TYPE);
        assert_eq!(body_text(response).await, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_metadata_sets_status_and_headers() {
        let meta = ScriptResponse {
            status: Some(404),
            status_text: None,
            headers: BTreeMap::from([("X-Test".to_string(), "1".to_string())]),
        };
        let response = assemble_response(result("<p>hi</p>", "", Some(meta)), false);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-test"], "1");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_text(response).await, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_diagnostics_prefix_the_body() {
        let response = assemble_response(result("<p>partial</p>", "TypeError: <x>", None), false);
        let body = body_text(response).await;

        assert!(body.starts_with("<div"));
        assert!(body.contains("TypeError: &lt;x&gt;"));
        assert!(body.ends_with("<p>partial</p>"));
    }

    #[tokio::test]
    async fn test_reload_script_comes_last() {
        let response = assemble_response(result("<p>hi</p>", "", None), true);
        let body = body_text(response).await;
        assert!(body.starts_with("<p>hi</p>"));
        assert!(body.ends_with(RELOAD_SCRIPT));
    }

    #[test]
    fn test_routes() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("docs")).unwrap();
        std::fs::write(root.path().join("LICENSE"), "MIT").unwrap();

        let template = TemplateConfig::default();
        let mapper = PathMapper::new(&template);
        let route = |path: &str| resolve_route(root.path(), &template, &mapper, path);
        let page = |file: &str, params: &[(&str, &str)]| Route::Page {
            template: root.path().join(file),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        assert_eq!(route("/"), page("index.tsx", &[]));
        assert_eq!(route("/docs"), page("docs/index.tsx", &[]));
        assert_eq!(route("/about.tsx"), page("about.tsx", &[]));
        assert_eq!(route("/about.html"), page("about.tsx", &[]));
        assert_eq!(route("/about[x=1].html"), page("about.tsx", &[("x", "1")]));
        assert_eq!(route("/about"), page("about.tsx", &[]));
        assert_eq!(route("/style.css"), Route::Asset(root.path().join("style.css")));
        assert_eq!(route("/LICENSE"), Route::Asset(root.path().join("LICENSE")));
        assert_eq!(
            route("/about%5Bq=a%252Cb%5D.html"),
            page("about.tsx", &[("q", "a,b")])
        );
        assert_eq!(
            route("/about[name=John%2520Doe].html"),
            page("about.tsx", &[("name", "John Doe")])
        );
        assert_eq!(route("/my%20page.tsx"), page("my page.tsx", &[]));

        // Nothing resolves outside the root.
        assert_eq!(
            route("/../etc/passwd.txt"),
            Route::Asset(root.path().join("etc/passwd.txt"))
        );
        assert_eq!(
            route("/%2E%2E/etc/passwd.txt"),
            Route::Asset(root.path().join("etc/passwd.txt"))
        );
        assert_eq!(route("/../etc/passwd"), page("etc/passwd.tsx", &[]));
    }
}

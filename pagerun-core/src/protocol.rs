//! Wire format shared by the renderer and template processes.
//!
//! The parent writes one JSON [`RenderRequest`] to the child's stdin. The
//! child writes the page body to stdout, optionally followed by
//! [`OUTPUT_DELIMITER`] and a JSON [`ScriptResponse`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Set in the environment of every render subprocess.
pub const RENDER_ENV: &str = "PAGERUN_RENDER";

/// Separates the page body from the trailing response metadata on stdout.
pub const OUTPUT_DELIMITER: &str = "~~~~~~~[response]~~~~~~\n`";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl RenderRequest {
    /// A bodiless `GET` for `url`, carrying `data` as its parameters.
    pub fn get<U: Into<String>>(url: U, data: BTreeMap<String, String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            body: String::new(),
            data,
        }
    }
}

/// HTTP metadata a template may attach to its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ScriptResponse {
    pub fn status_or_default(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn status_text_or_default(&self) -> &str {
        self.status_text.as_deref().unwrap_or("OK")
    }
}

/// Stdout of a render process, split into its two parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOutput {
    pub body: String,
    pub response: Option<ScriptResponse>,
}

/// Split raw stdout at the first delimiter.
///
/// Metadata that fails to parse is dropped with a warning; the body is
/// returned either way.
pub fn decode_output(mut raw: String) -> DecodedOutput {
    let Some(index) = raw.find(OUTPUT_DELIMITER) else {
        return DecodedOutput {
            body: raw,
            response: None,
        };
    };

    let meta = raw[index + OUTPUT_DELIMITER.len()..].trim();
    let response = match serde_json::from_str::<ScriptResponse>(meta) {
        Ok(response) => Some(response),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed response metadata");
            None
        }
    };

    raw.truncate(index);
    DecodedOutput { body: raw, response }
}

/// Inverse of [`decode_output`].
pub fn encode_output(
    body: &str,
    response: Option<&ScriptResponse>,
) -> Result<String, serde_json::Error> {
    let mut out = String::from(body);
    if let Some(response) = response {
        out.push_str(OUTPUT_DELIMITER);
        out.push('\n');
        out.push_str(&serde_json::to_string(response)?);
        out.push('\n');
    }
    Ok(out)
}

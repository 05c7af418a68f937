//! Template side of the render protocol, for page programs written in Rust.
//!
//! A page is a function from a [`RenderRequest`] to a [`PageOutput`]. When the
//! process runs under the renderer (the [`RENDER_ENV`] marker is set) the
//! request is read from stdin and the output is written in protocol form.
//! Run by hand, the page renders once with an empty request and prints only
//! its body.

use std::io::{Read, Write};

use crate::error::GuestError;
use crate::protocol::{RENDER_ENV, RenderRequest, ScriptResponse, encode_output};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutput {
    pub body: String,
    pub response: Option<ScriptResponse>,
}

impl PageOutput {
    pub fn html<S: Into<String>>(body: S) -> Self {
        Self {
            body: body.into(),
            response: None,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.response.get_or_insert_with(ScriptResponse::default).status = Some(status);
        self
    }

    pub fn status_text<S: Into<String>>(mut self, text: S) -> Self {
        self.response
            .get_or_insert_with(ScriptResponse::default)
            .status_text = Some(text.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.response
            .get_or_insert_with(ScriptResponse::default)
            .headers
            .insert(key.into(), value.into());
        self
    }
}

/// Is this process being run as a render subprocess?
pub fn is_render_invocation() -> bool {
    std::env::var_os(RENDER_ENV).is_some()
}

/// Read a request from `reader`. Empty input yields the default request.
pub fn load_request<R: Read>(mut reader: R) -> Result<RenderRequest, GuestError> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Ok(RenderRequest::default());
    }
    Ok(serde_json::from_str(&input)?)
}

/// Write `output` to `writer`, with metadata only in render mode.
pub fn write_output<W: Write>(
    mut writer: W,
    output: &PageOutput,
    render_mode: bool,
) -> Result<(), GuestError> {
    let text = if render_mode {
        encode_output(&output.body, output.response.as_ref())?
    } else {
        output.body.clone()
    };
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Entry point for a page program.
pub fn run_page<F>(page: F) -> Result<(), GuestError>
where
    F: FnOnce(&RenderRequest) -> PageOutput,
{
    let render_mode = is_render_invocation();
    let request = if render_mode {
        load_request(std::io::stdin().lock())?
    } else {
        RenderRequest::default()
    };

    let output = page(&request);
    write_output(std::io::stdout().lock(), &output, render_mode)
}

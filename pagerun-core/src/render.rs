use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::TemplateConfig;
use crate::error::RenderError;
use crate::protocol::{RENDER_ENV, RenderRequest, ScriptResponse, decode_output};

/// Everything one render process produced.
#[derive(Debug)]
pub struct RenderResult {
    /// Page body, everything on stdout before the delimiter
    pub output: String,
    /// Whatever the process wrote to stderr
    pub diagnostics: String,
    pub response: Option<ScriptResponse>,
    pub exit_status: ExitStatus,
}

impl RenderResult {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.trim().is_empty()
    }
}

/// Runs template modules, one subprocess per render.
#[derive(Debug, Clone)]
pub struct Renderer {
    command: Vec<String>,
}

impl Renderer {
    pub fn new(template: &TemplateConfig) -> Self {
        Self {
            command: template.command.clone(),
        }
    }

    pub async fn render(
        &self,
        template_path: &Path,
        request: &RenderRequest,
    ) -> Result<RenderResult, RenderError> {
        let (program, args) = self.command.split_first().ok_or(RenderError::EmptyCommand)?;
        let template_path = std::path::absolute(template_path)?;
        let payload = serde_json::to_vec(request)?;

        tracing::debug!(template = %template_path.display(), url = %request.url, "spawning render");

        let mut child = Command::new(program)
            .args(args)
            .arg(&template_path)
            .env(RENDER_ENV, "1")
            .env("NO_COLOR", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::ProcessSpawn {
                command: self.command.join(" "),
                source,
            })?;

        let stdin = child.stdin.take();
        let write_request = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // The template exited without reading its request.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                Err(e) => Err(e),
                Ok(()) => stdin.shutdown().await,
            }
        };

        // stdin, stdout and stderr all progress together so a full pipe on
        // one side can never stall the others.
        let (written, output) = tokio::join!(write_request, child.wait_with_output());
        let output = output?;
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        let decoded = decode_output(String::from_utf8_lossy(&output.stdout).into_owned());
        let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!(
                template = %template_path.display(),
                status = %output.status,
                "render process exited unsuccessfully"
            );
        }

        Ok(RenderResult {
            output: decoded.body,
            diagnostics,
            response: decoded.response,
            exit_status: output.status,
        })
    }
}

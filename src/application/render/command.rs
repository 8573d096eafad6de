use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::Stdio,
    time::Instant,
};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::job::InputKind;

use super::{RenderError, RenderRequest, RenderedDocument, Renderer, file_extension};

/// Renderer that shells out to a configured converter executable.
///
/// The converter is invoked as
/// `<converter> --input <file|url> --input-kind <url|html> --format <fmt>
/// --output <path> [--opt key=value ...]` and must write the artifact to
/// the output path before exiting zero.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    converter_path: PathBuf,
    scratch_dir: PathBuf,
}

impl CommandRenderer {
    pub fn new(converter_path: PathBuf, scratch_dir: PathBuf) -> Result<Self, RenderError> {
        std::fs::create_dir_all(&scratch_dir).map_err(RenderError::Stage)?;
        Ok(Self {
            converter_path,
            scratch_dir,
        })
    }
}

#[async_trait::async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderedDocument, RenderError> {
        let started_at = Instant::now();

        // HTML payloads are staged through a scratch file; URL inputs are
        // handed to the converter verbatim. The staging handle must outlive
        // the child process.
        let mut staged_input: Option<NamedTempFile> = None;
        let input_arg = match request.input.kind {
            InputKind::Url => request.input.content.clone(),
            InputKind::Html => {
                let mut file = tempfile::Builder::new()
                    .suffix(".html")
                    .tempfile_in(&self.scratch_dir)
                    .map_err(RenderError::Stage)?;
                file.write_all(request.input.content.as_bytes())
                    .map_err(RenderError::Stage)?;
                file.flush().map_err(RenderError::Stage)?;
                let path = file.path().display().to_string();
                staged_input = Some(file);
                path
            }
        };

        let extension = file_extension(&request.options.format);
        let output_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.scratch_dir)
            .map_err(RenderError::Stage)?;

        let mut command = Command::new(&self.converter_path);
        command
            .arg("--input")
            .arg(&input_arg)
            .arg("--input-kind")
            .arg(request.input.kind.as_str())
            .arg("--format")
            .arg(&request.options.format)
            .arg("--output")
            .arg(output_file.path());
        for (key, value) in &request.options.extra {
            command.arg("--opt").arg(format!("{key}={}", opt_value(value)));
        }

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "application::render::command",
                    job_id = %request.job_id,
                    converter = %self.converter_path.display(),
                    error = %err,
                    "failed to spawn converter"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::ConverterUnavailable(err)
                } else {
                    RenderError::Stage(err)
                }
            })?;

        drop(staged_input);

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "application::render::command",
                job_id = %request.job_id,
                format = %request.options.format,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "converter invocation failed"
            );
            return Err(RenderError::Converter { exit_code, stderr });
        }

        let bytes = tokio::fs::read(output_file.path())
            .await
            .map_err(RenderError::Read)?;

        info!(
            target = "application::render::command",
            job_id = %request.job_id,
            format = %request.options.format,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            artifact_bytes = bytes.len(),
            "converter produced artifact"
        );

        Ok(RenderedDocument {
            bytes: Bytes::from(bytes),
        })
    }
}

fn opt_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

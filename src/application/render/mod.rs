//! The render capability: a pluggable converter invoked once per job.

mod command;

pub use command::CommandRenderer;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::{JobInput, RenderOptions};

/// One invocation of the converter, borrowed from the job record.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub job_id: Uuid,
    pub input: &'a JobInput,
    pub options: &'a RenderOptions,
}

/// The converter's output, ready to be persisted as an artifact.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("converter unavailable: {0}")]
    ConverterUnavailable(std::io::Error),
    #[error("converter invocation failed (exit {exit_code:?}): {stderr}")]
    Converter {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to stage render input: {0}")]
    Stage(std::io::Error),
    #[error("failed to read converter output: {0}")]
    Read(std::io::Error),
}

/// Format-specific converter contract. Implementations receive the input
/// and the options verbatim, including keys the engine does not recognize.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderedDocument, RenderError>;
}

/// File extension for an output format. Composite names such as `a4-pdf`
/// map onto their trailing segment.
pub fn file_extension(format: &str) -> &str {
    format.rsplit('-').next().unwrap_or(format)
}

/// Content type served for a format's artifact bytes.
pub fn content_type_for(format: &str) -> String {
    mime_guess::from_ext(file_extension(format))
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

use reqwest::{Client, Response, StatusCode, Url};
use thiserror::Error;
use uuid::Uuid;

use stampa_api_types::{
    ApiErrorBody, JobStatusResponse, RenderSubmitRequest, RenderSubmitResponse,
};

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("engine URL is required (use --url or STAMPA_URL)")]
    MissingUrl,
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write output file {path}: {source}")]
    OutputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected request ({code}): {message}")]
    Api { code: String, message: String },
    #[error("job `{job_id}` did not reach a terminal state within {timeout_seconds}s")]
    WaitTimeout { job_id: Uuid, timeout_seconds: u64 },
    #[error("failed to encode response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let url = cli.url.as_deref().ok_or(CliError::MissingUrl)?;
    Ctx::new(url)
}

impl Ctx {
    pub fn new(base: &str) -> Result<Self, CliError> {
        let base = Url::parse(base)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("stampa-cli/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    pub async fn submit(
        &self,
        request: &RenderSubmitRequest,
    ) -> Result<RenderSubmitResponse, CliError> {
        let response = self
            .client
            .post(self.url("api/v1/render")?)
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn status(&self, job_id: Uuid) -> Result<JobStatusResponse, CliError> {
        let response = self
            .client
            .get(self.url(&format!("api/v1/status/{job_id}"))?)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn download(&self, job_id: Uuid) -> Result<Vec<u8>, CliError> {
        let response = self
            .client
            .get(self.url(&format!("api/v1/download/{job_id}"))?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, CliError> {
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn api_error(response: Response) -> CliError {
        let status = response.status();
        match response.json::<ApiErrorBody>().await {
            Ok(body) => CliError::Api {
                code: body.error.code,
                message: match body.error.hint {
                    Some(hint) => format!("{} ({hint})", body.error.message),
                    None => body.error.message,
                },
            },
            Err(_) => CliError::Api {
                code: status_code_label(status),
                message: format!("unexpected response status {status}"),
            },
        }
    }
}

fn status_code_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown")
        .to_lowercase()
        .replace(' ', "_")
}

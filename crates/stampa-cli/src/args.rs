use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use stampa_api_types::ApiInputKind;
use uuid::Uuid;

/// Command-line client for the Stampa render job API.
#[derive(Debug, Parser)]
#[command(name = "stampa-cli", version, about = "Stampa render job client")]
pub struct Cli {
    /// Base URL of the engine (e.g. http://127.0.0.1:3000).
    #[arg(long = "url", env = "STAMPA_URL", value_name = "URL", global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a render job and print the assigned job id.
    Submit(SubmitArgs),
    /// Print the current status of a job.
    Status(JobArgs),
    /// Download a completed job's artifact to a file.
    Download(DownloadArgs),
    /// Poll a job until it reaches a terminal state.
    Wait(WaitArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputType {
    Url,
    Html,
}

impl From<InputType> for ApiInputKind {
    fn from(kind: InputType) -> Self {
        match kind {
            InputType::Url => ApiInputKind::Url,
            InputType::Html => ApiInputKind::Html,
        }
    }
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Kind of source content.
    #[arg(long = "input-type", value_enum)]
    pub input_type: InputType,

    /// Inline source content (a URL or raw HTML).
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the source content from a file.
    #[arg(long = "content-file", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub content_file: Option<PathBuf>,

    /// Output format (pdf, png, docx, a4-pdf, ...).
    #[arg(long)]
    pub format: String,

    /// Extra converter option as key=value; repeatable.
    #[arg(long = "opt", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job id returned by submit.
    #[arg(value_name = "JOB_ID")]
    pub job_id: Uuid,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Job id returned by submit.
    #[arg(value_name = "JOB_ID")]
    pub job_id: Uuid,

    /// Path to write the artifact to.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Job id returned by submit.
    #[arg(value_name = "JOB_ID")]
    pub job_id: Uuid,

    /// Give up after this many seconds.
    #[arg(long = "timeout-seconds", default_value_t = 120)]
    pub timeout_seconds: u64,

    /// Delay between status polls in milliseconds.
    #[arg(long = "interval-ms", default_value_t = 500)]
    pub interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_submit_arguments() {
        let cli = Cli::parse_from([
            "stampa-cli",
            "--url",
            "http://localhost:3000",
            "submit",
            "--input-type",
            "html",
            "--content",
            "<h1>Hello World</h1>",
            "--format",
            "docx",
            "--opt",
            "margin=12mm",
            "--opt",
            "landscape=true",
        ]);

        assert_eq!(cli.url.as_deref(), Some("http://localhost:3000"));
        match cli.command {
            Commands::Submit(submit) => {
                assert_eq!(submit.input_type, InputType::Html);
                assert_eq!(submit.content.as_deref(), Some("<h1>Hello World</h1>"));
                assert_eq!(submit.format, "docx");
                assert_eq!(submit.options, vec!["margin=12mm", "landscape=true"]);
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_wait_defaults() {
        let id = Uuid::new_v4();
        let cli = Cli::parse_from(["stampa-cli", "wait", &id.to_string()]);

        match cli.command {
            Commands::Wait(wait) => {
                assert_eq!(wait.job_id, id);
                assert_eq!(wait.timeout_seconds, 120);
                assert_eq!(wait.interval_ms, 500);
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn content_and_content_file_conflict() {
        let result = Cli::try_parse_from([
            "stampa-cli",
            "submit",
            "--input-type",
            "html",
            "--content",
            "<p>x</p>",
            "--content-file",
            "/tmp/page.html",
            "--format",
            "pdf",
        ]);
        assert!(result.is_err());
    }
}

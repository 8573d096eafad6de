//! stampa-cli: command-line client for the Stampa render job API.

mod args;
mod client;

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;
use tokio::time::{Instant, sleep};

use stampa_api_types::{ApiRenderOptions, RenderSubmitRequest};

use args::{Cli, Commands, DownloadArgs, JobArgs, SubmitArgs, WaitArgs};
use client::{CliError, Ctx, build_ctx_from_cli};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;

    match cli.command {
        Commands::Submit(cmd) => submit(&ctx, cmd).await?,
        Commands::Status(cmd) => status(&ctx, cmd).await?,
        Commands::Download(cmd) => download(&ctx, cmd).await?,
        Commands::Wait(cmd) => wait(&ctx, cmd).await?,
    }

    Ok(())
}

async fn submit(ctx: &Ctx, cmd: SubmitArgs) -> Result<(), CliError> {
    let content = match (cmd.content, cmd.content_file) {
        (Some(content), None) => content,
        (None, Some(path)) => {
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| CliError::InputFile {
                    path: path.display().to_string(),
                    source,
                })?
        }
        _ => {
            return Err(CliError::InvalidInput(
                "exactly one of --content or --content-file is required".to_string(),
            ));
        }
    };

    let request = RenderSubmitRequest {
        input_type: cmd.input_type.into(),
        content,
        options: ApiRenderOptions {
            format: cmd.format,
            extra: parse_extra_options(&cmd.options)?,
        },
    };

    let response = ctx.submit(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn status(ctx: &Ctx, cmd: JobArgs) -> Result<(), CliError> {
    let response = ctx.status(cmd.job_id).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn download(ctx: &Ctx, cmd: DownloadArgs) -> Result<(), CliError> {
    let bytes = ctx.download(cmd.job_id).await?;
    tokio::fs::write(&cmd.output, &bytes)
        .await
        .map_err(|source| CliError::OutputFile {
            path: cmd.output.display().to_string(),
            source,
        })?;
    println!("{} ({} bytes)", cmd.output.display(), bytes.len());
    Ok(())
}

/// Poll status until the job settles; the polling loop is a client
/// concern, the engine only guarantees a terminal state in bounded time.
async fn wait(ctx: &Ctx, cmd: WaitArgs) -> Result<(), CliError> {
    let deadline = Instant::now() + Duration::from_secs(cmd.timeout_seconds);
    let interval = Duration::from_millis(cmd.interval_ms);

    loop {
        let response = ctx.status(cmd.job_id).await?;
        if response.state.is_terminal() {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(CliError::WaitTimeout {
                job_id: cmd.job_id,
                timeout_seconds: cmd.timeout_seconds,
            });
        }

        sleep(interval).await;
    }
}

fn parse_extra_options(
    options: &[String],
) -> Result<BTreeMap<String, serde_json::Value>, CliError> {
    let mut extra = BTreeMap::new();
    for option in options {
        let (key, value) = option.split_once('=').ok_or_else(|| {
            CliError::InvalidInput(format!("option `{option}` is not in key=value form"))
        })?;
        if key.is_empty() {
            return Err(CliError::InvalidInput(format!(
                "option `{option}` has an empty key"
            )));
        }
        // Values that parse as JSON keep their type; everything else is a string.
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        extra.insert(key.to_string(), value);
    }
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_options_keep_json_types() {
        let extra = parse_extra_options(&[
            "margin=12mm".to_string(),
            "landscape=true".to_string(),
            "scale=0.8".to_string(),
        ])
        .expect("parsed");

        assert_eq!(extra["margin"], serde_json::json!("12mm"));
        assert_eq!(extra["landscape"], serde_json::json!(true));
        assert_eq!(extra["scale"], serde_json::json!(0.8));
    }

    #[test]
    fn malformed_options_are_rejected() {
        assert!(parse_extra_options(&["no-equals".to_string()]).is_err());
        assert!(parse_extra_options(&["=value".to_string()]).is_err());
    }
}

use std::{process, sync::Arc};

use stampa::{
    application::{
        error::AppError,
        queue::JobQueue,
        render::CommandRenderer,
        store::JobStore,
        worker::{EngineContext, WorkerPool},
    },
    config,
    infra::{
        artifacts::ArtifactStore,
        error::InfraError,
        http::{ApiState, build_api_router},
        memory::InMemoryJobStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let artifacts = Arc::new(
        ArtifactStore::new(settings.artifacts.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let renderer = Arc::new(
        CommandRenderer::new(
            settings.renderer.converter_path.clone(),
            settings.renderer.scratch_dir.clone(),
        )
        .map_err(|err| AppError::unexpected(format!("failed to initialise renderer: {err}")))?,
    );

    let (queue, stream) = JobQueue::bounded(settings.engine.queue_capacity.get() as usize);

    let engine_ctx = EngineContext {
        store: store.clone(),
        artifacts: artifacts.clone(),
        renderer,
        deadline: settings.engine.processing_deadline,
    };
    let pool = WorkerPool::spawn(
        engine_ctx,
        stream,
        settings.engine.workers.get() as usize,
        settings.engine.reaper_interval,
    );

    let app = build_api_router(ApiState {
        store,
        queue,
        artifacts,
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "stampa::server",
        addr = %settings.server.addr,
        workers = settings.engine.workers.get(),
        queue_capacity = settings.engine.queue_capacity.get(),
        "render engine listening"
    );

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    // The router (and with it the queue's submission half) is gone once
    // serve returns, so workers drain what is left and then observe the
    // closed queue.
    pool.shutdown(settings.server.graceful_shutdown).await;

    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}

mod app_state;
mod config;
mod console;
mod controller;
mod export;
mod prompt;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use compute_client::{load_definition, ComputeClient, ComputeClientOptions};
use scene::{Camera, HeadlessRenderer, Scene, Viewport};
use storage::{CredentialStore, Storage};
use tokio::{
    io::BufReader,
    sync::{watch, RwLock},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    app_state::AppState,
    config::{load_settings, normalize_database_url, Settings},
    console::{spawn_event_printer, Console},
    controller::Controller,
    export::{export_document, save_artifact, ExportFormat},
    prompt::StdinPrompt,
};

#[derive(Parser, Debug)]
#[command(about = "Parametric vessel client for a remote compute service")]
struct Args {
    /// Config file; defaults to ./vessel.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    compute_url: Option<String>,
    /// Definition file path or http(s) url.
    #[arg(long)]
    definition: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    density: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    radius: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<f64>,
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Forget the stored api key and ask again.
    #[arg(long)]
    reset_key: bool,
    /// Compute once, save the document, and exit.
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.compute_url {
            settings.compute_url = url.clone();
        }
        if let Some(definition) = &self.definition {
            settings.definition = definition.clone();
        }
        if let Some(v) = self.density {
            settings.parameters.density = v;
        }
        if let Some(v) = self.radius {
            settings.parameters.radius = v;
        }
        if let Some(v) = self.rotate {
            settings.parameters.rotate = v;
        }
        if let Some(dir) = &self.download_dir {
            settings.download_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open local store '{database_url}'"))?;
    storage.health_check().await?;
    let credentials = CredentialStore::new(storage, Arc::new(StdinPrompt));
    if args.reset_key && credentials.forget().await? {
        info!("cleared stored compute api key");
    }
    let credential = credentials.credential().await?;

    let http = reqwest::Client::new();
    let definition = load_definition(&http, &settings.definition)
        .await
        .context("failed to load the definition")?;

    let backend = ComputeClient::new(ComputeClientOptions {
        base_url: settings.compute_url.clone(),
        credential,
        timeout: settings.compute_timeout(),
    })?;

    let state = Arc::new(AppState::new(
        definition,
        settings.parameters,
        Scene::with_default_lights(),
    ));
    let controller = Arc::new(Controller::new(Arc::clone(&state), Arc::new(backend)));

    let camera = Arc::new(RwLock::new(Camera::perspective(
        settings.viewport_width,
        settings.viewport_height,
    )));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let viewport = Viewport::new(state.scene(), Arc::clone(&camera), settings.frame_rate);
    let render_loop = tokio::spawn(async move {
        let mut renderer = HeadlessRenderer::default();
        viewport.run(&mut renderer, shutdown_rx).await
    });

    let outcome = if args.once {
        run_once(&controller, &settings).await
    } else {
        run_interactive(&controller, camera, &settings).await
    };

    let _ = shutdown_tx.send(true);
    match render_loop.await {
        Ok(frames) => info!(frames, "viewport closed"),
        Err(err) => warn!("render loop task failed: {err}"),
    }
    outcome
}

async fn run_once(controller: &Controller, settings: &Settings) -> Result<()> {
    controller.run_cycle().await?;
    let artifact = export_document(
        controller.state(),
        ExportFormat::Native,
        &settings.export_file_name,
    )
    .await?;
    let path = save_artifact(&artifact, &settings.download_dir).await?;
    println!("saved {}", path.display());
    Ok(())
}

async fn run_interactive(
    controller: &Arc<Controller>,
    camera: Arc<RwLock<Camera>>,
    settings: &Settings,
) -> Result<()> {
    let printer = spawn_event_printer(controller.subscribe());

    // Initial compute with the configured values, like the first page load.
    if let Err(err) = controller.run_cycle().await {
        warn!("initial compute failed: {err}");
    }

    let console = Console::new(
        Arc::clone(controller),
        camera,
        settings.download_dir.clone(),
        settings.export_file_name.clone(),
    );
    let result = console.run(BufReader::new(tokio::io::stdin())).await;
    printer.abort();
    result
}

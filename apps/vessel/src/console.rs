//! Line-oriented front-end: slider releases, compute, download, camera orbit.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use scene::Camera;
use shared::domain::Parameter;
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    controller::{Controller, ControllerEvent, ControllerStatus},
    export::{export_document, save_artifact, ExportError, ExportFormat},
};

pub const HELP: &str = "\
commands:
  density <n> | radius <n> | rotate <n>   set a slider and recompute
  compute                                 recompute with current values
  download [stl]                          save the current document
  status                                  show parameters and pipeline state
  orbit <yaw> <pitch>                     orbit the camera (degrees)
  help                                    show this text
  quit                                    exit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Set(Parameter, f64),
    Compute,
    Download(ExportFormat),
    Status,
    Orbit { yaw: f64, pitch: f64 },
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("'{0}' is not a finite number")]
    InvalidNumber(String),
    #[error("unknown download format '{0}' (expected 'stl')")]
    UnknownFormat(String),
}

fn number(raw: Option<&str>, command: &'static str, what: &'static str) -> Result<f64, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument { command, what })?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(raw.to_string()))
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();

        if let Some(parameter) = Parameter::parse(&head) {
            let value = number(words.next(), "set", "a value")?;
            return Ok(ConsoleCommand::Set(parameter, value));
        }

        match head.as_str() {
            "compute" => Ok(ConsoleCommand::Compute),
            "download" | "export" => match words.next() {
                None => Ok(ConsoleCommand::Download(ExportFormat::Native)),
                Some(f) if f.eq_ignore_ascii_case("stl") => {
                    Ok(ConsoleCommand::Download(ExportFormat::Stl))
                }
                Some(other) => Err(CommandError::UnknownFormat(other.to_string())),
            },
            "status" => Ok(ConsoleCommand::Status),
            "orbit" => {
                let yaw = number(words.next(), "orbit", "<yaw> <pitch>")?;
                let pitch = number(words.next(), "orbit", "<yaw> <pitch>")?;
                Ok(ConsoleCommand::Orbit { yaw, pitch })
            }
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            _ => Err(CommandError::Unknown(head)),
        }
    }
}

pub struct Console {
    controller: Arc<Controller>,
    camera: Arc<RwLock<Camera>>,
    download_dir: PathBuf,
    export_file_name: String,
    cycles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    pub fn new(
        controller: Arc<Controller>,
        camera: Arc<RwLock<Camera>>,
        download_dir: PathBuf,
        export_file_name: String,
    ) -> Self {
        Self {
            controller,
            camera,
            download_dir,
            export_file_name,
            cycles: Mutex::new(Vec::new()),
        }
    }

    /// Reads commands until `quit` or end of input, then waits for in-flight cycles.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> anyhow::Result<()> {
        let mut lines = input.lines();
        println!("{HELP}");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<ConsoleCommand>() {
                Ok(command) => command,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            if command == ConsoleCommand::Quit {
                break;
            }
            if let Some(reply) = self.handle(command).await {
                println!("{reply}");
            }
        }

        self.wait_for_cycles().await;
        Ok(())
    }

    /// Applies one command; the returned text is shown to the user.
    pub async fn handle(&self, command: ConsoleCommand) -> Option<String> {
        match command {
            ConsoleCommand::Set(parameter, value) => {
                // Cycles run in the background so a newer release can overtake an older one.
                let controller = Arc::clone(&self.controller);
                self.spawn_cycle(async move {
                    controller.on_parameter_release(parameter, value).await
                })
                .await;
                Some(format!("{parameter} = {value}"))
            }
            ConsoleCommand::Compute => {
                let controller = Arc::clone(&self.controller);
                self.spawn_cycle(async move { controller.run_cycle().await })
                    .await;
                None
            }
            ConsoleCommand::Download(format) => Some(self.download(format).await),
            ConsoleCommand::Status => Some(self.status().await),
            ConsoleCommand::Orbit { yaw, pitch } => {
                let mut camera = self.camera.write().await;
                camera.orbit(yaw, pitch);
                let p = camera.position;
                Some(format!("camera at ({:.2}, {:.2}, {:.2})", p[0], p[1], p[2]))
            }
            ConsoleCommand::Help => Some(HELP.to_string()),
            ConsoleCommand::Quit => None,
        }
    }

    pub async fn wait_for_cycles(&self) {
        let handles: Vec<_> = self.cycles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("compute task panicked: {err}");
            }
        }
    }

    async fn spawn_cycle<F, T, E>(&self, cycle: F)
    where
        F: std::future::Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(err) = cycle.await {
                debug!("compute cycle ended with error: {err}");
            }
        });
        let mut cycles = self.cycles.lock().await;
        cycles.retain(|h| !h.is_finished());
        cycles.push(handle);
    }

    async fn download(&self, format: ExportFormat) -> String {
        let ui = self.controller.ui_state().await;
        if !ui.export_enabled {
            let refusal = if ui.loading_indicator {
                ExportError::Busy
            } else {
                ExportError::NoDocument
            };
            return refusal.to_string();
        }

        let state = self.controller.state();
        let artifact = match export_document(state, format, &self.export_file_name).await {
            Ok(artifact) => artifact,
            Err(err) => return err.to_string(),
        };
        match save_artifact(&artifact, &self.download_dir).await {
            Ok(path) => format!(
                "saved {} ({} bytes, {})",
                path.display(),
                artifact.bytes.len(),
                artifact.mime_type
            ),
            Err(err) => err.to_string(),
        }
    }

    async fn status(&self) -> String {
        let parameters = self.controller.state().parameters().await;
        let status = match self.controller.status().await {
            ControllerStatus::Idle => "idle".to_string(),
            ControllerStatus::Busy { generation } => format!("busy (cycle {generation})"),
        };
        let ui = self.controller.ui_state().await;
        let (lights, objects) = {
            let scene = self.controller.state().scene();
            let scene = scene.read().await;
            (scene.light_count(), scene.geometry_count())
        };

        let mut out = format!(
            "density={} radius={} rotate={}\nstatus={status} export={}\nscene: {lights} lights, {objects} objects",
            parameters.density,
            parameters.radius,
            parameters.rotate,
            if ui.export_enabled { "enabled" } else { "disabled" },
        );
        if let Some(err) = self.controller.last_error().await {
            out.push_str(&format!("\nlast error: {err}"));
        }
        out
    }
}

/// Prints controller events until the channel closes.
pub fn spawn_event_printer(mut events: broadcast::Receiver<ControllerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub fn describe_event(event: &ControllerEvent) -> Option<String> {
    match event {
        ControllerEvent::Busy { generation } => Some(format!("[cycle {generation}] computing...")),
        ControllerEvent::Completed {
            generation,
            objects,
            wireframes,
        } => Some(format!(
            "[cycle {generation}] done: {objects} objects, {wireframes} wireframes"
        )),
        ControllerEvent::Discarded { generation } => {
            Some(format!("[cycle {generation}] superseded by a newer request"))
        }
        ControllerEvent::Failed { generation, error } => {
            Some(format!("[cycle {generation}] failed: {error}"))
        }
        ControllerEvent::Ui(ui) if !ui.loading_indicator => Some(format!(
            "ready (download {})",
            if ui.export_enabled { "available" } else { "unavailable" }
        )),
        ControllerEvent::Ui(_) => None,
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;

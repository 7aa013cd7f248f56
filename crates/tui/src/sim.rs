use std::time::Duration;

use anyhow::{Context, Result};
use fluidport_core::{
    sandbox::{SandboxView, StepReport},
    world::HostEvent,
    AppConfig, Sandbox, SnapshotStore, SyncData,
};
use tokio::{sync::mpsc, time};
use tracing::{debug, info, warn};

/// User requests forwarded to the authoritative side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleDirection,
    ToggleAssembly,
    ToggleAttachment,
    ToggleNeighbor,
    SwapNeighborKind,
    TogglePause,
    Step,
    Save,
    LoadLatest,
}

/// What the authoritative side pushes to the presentation side after every change.
#[derive(Debug, Clone)]
pub struct Frame {
    pub view: SandboxView,
    pub sync: SyncData,
    pub report: Option<StepReport>,
    pub events: Vec<HostEvent>,
    pub paused: bool,
    pub note: Option<String>,
}

/// Owns the sandbox and steps it on a timer.
pub struct Simulation {
    config: AppConfig,
    sandbox: Sandbox,
    snapshots: SnapshotStore,
    paused: bool,
}

impl Simulation {
    pub fn new(config: AppConfig) -> Self {
        let sandbox = Sandbox::new(&config);
        let snapshots = SnapshotStore::new(config.snapshot_dir.clone());
        Self {
            config,
            sandbox,
            snapshots,
            paused: false,
        }
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        frames: mpsc::Sender<Frame>,
    ) -> Result<()> {
        let mut ticker = time::interval(Duration::from_millis(self.config.tick_rate_ms.max(1)));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        info!(
            snapshots = %self.snapshots.root().display(),
            "simulation started"
        );

        if frames.send(self.frame(None, None)).await.is_err() {
            return Ok(());
        }

        loop {
            let frame = tokio::select! {
                _ = ticker.tick() => {
                    if self.paused {
                        continue;
                    }
                    let report = self.sandbox.step();
                    self.frame(Some(report), None)
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    let note = self.apply(command);
                    self.frame(None, note)
                }
            };
            if frames.send(frame).await.is_err() {
                break;
            }
        }

        info!("simulation stopped");
        Ok(())
    }

    fn apply(&mut self, command: Command) -> Option<String> {
        debug!(?command, "applying command");
        match command {
            Command::ToggleDirection => self.sandbox.toggle_direction(),
            Command::ToggleAssembly => self.sandbox.toggle_assembly(),
            Command::ToggleAttachment => self.sandbox.toggle_attachment(),
            Command::ToggleNeighbor => self.sandbox.toggle_neighbor(),
            Command::SwapNeighborKind => self.sandbox.swap_neighbor_kind(),
            Command::TogglePause => {
                self.paused = !self.paused;
                return Some(if self.paused { "Paused" } else { "Running" }.to_string());
            }
            Command::Step => {
                let report = self.sandbox.step();
                return Some(format!(
                    "Stepped to tick {}: pushed {}, pumped {}",
                    report.tick, report.pushed, report.pumped
                ));
            }
            Command::Save => {
                return Some(match self.save() {
                    Ok(name) => format!("Saved snapshot '{name}'"),
                    Err(err) => {
                        warn!(?err, "snapshot save failed");
                        format!("Save failed: {err}")
                    }
                });
            }
            Command::LoadLatest => {
                return Some(match self.load_latest() {
                    Ok(Some(name)) => format!("Loaded snapshot '{name}'"),
                    Ok(None) => "No snapshots yet".to_string(),
                    Err(err) => {
                        warn!(?err, "snapshot load failed");
                        format!("Load failed: {err}")
                    }
                });
            }
        }
        None
    }

    fn save(&self) -> Result<String> {
        let entry = self
            .snapshots
            .create(None, &self.sandbox.state())
            .context("failed to write snapshot")?;
        Ok(entry.name)
    }

    fn load_latest(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.snapshots.latest()? else {
            return Ok(None);
        };
        let state = self.snapshots.load(&entry)?;
        self.sandbox = Sandbox::restore(&self.config, &state);
        Ok(Some(entry.name))
    }

    fn frame(&mut self, report: Option<StepReport>, note: Option<String>) -> Frame {
        Frame {
            view: self.sandbox.view(),
            sync: self.sandbox.sync_data(),
            report,
            events: self.sandbox.drain_events(),
            paused: self.paused,
            note,
        }
    }
}

//! # Studio Runtime
//!
//! The daemon context that ties the services together: one watcher on the
//! score file, one dialog pump thread, one generator worker process, and
//! the change pipeline that runs between them.

use channel::ChannelError;
use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, warn};
use services_dialog::{
    DialogBackend, DialogCmd, DialogError, DialogThread, ProgressSpec, SimDialogBackend,
    CLOSE_PROGRESS, OPEN_PROGRESS, SHOW_QUESTION, UPDATE_PROGRESS,
};
use services_file_watch::{ScoreWatcher, WatchError, WatchHandle};
use services_generator::{
    GeneratorCmd, GeneratorRoutine, ScoreArtifact, SimModelBackend, EXIT as GENERATOR_EXIT,
    GENERATE, LOAD,
};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command as OsCommand;
use std::time::Duration;
use thiserror::Error;
use worker::{stdio_worker_actor, ProcessWorker, WorkerError, WorkerRoutine};

/// Question option that starts a generation round
const ACCEPT_OPTION: &str = "Generate";
/// Question option that skips the change
const DECLINE_OPTION: &str = "Ignore";

/// Studio error types
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Dialog error: {0}")]
    Dialog(#[from] DialogError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Watcher error: {0}")]
    Watch(#[from] WatchError),

    #[error("Failed to read score {}: {source}", .path.display())]
    ScoreRead { path: PathBuf, source: io::Error },

    #[error("Failed to write artifact {}: {source}", .path.display())]
    ArtifactWrite { path: PathBuf, source: io::Error },

    #[error("Unexpected reply: {0}")]
    Protocol(String),
}

/// Studio configuration
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Score file to watch
    pub score: PathBuf,
    /// Directory the generation model is loaded from
    pub model_dir: PathBuf,
    /// Watcher poll interval
    pub poll: Duration,
    /// Variations requested per accepted change
    pub batch: usize,
    /// Generator worker binary (defaults to the daemon's own binary)
    pub worker_cmd: Option<PathBuf>,
    /// Run the generator worker loop instead of the studio
    pub generator_worker: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            score: PathBuf::from("score.mid"),
            model_dir: PathBuf::from("model"),
            poll: Duration::from_millis(200),
            batch: 2,
            worker_cmd: None,
            generator_worker: false,
        }
    }
}

/// The daemon context
///
/// Owns every long-lived collaborator and is the only place they meet.
/// [`start`](Studio::start) wires them, [`run`](Studio::run) drives the
/// change pipeline, [`shutdown`](Studio::shutdown) unwinds them in reverse
/// start order.
pub struct Studio {
    config: StudioConfig,
    generator: ProcessWorker<GeneratorCmd>,
    dialog: DialogThread,
    watch: Option<WatchHandle>,
    changes: Receiver<PathBuf>,
    model_loaded: bool,
}

impl Studio {
    /// Starts the studio with the headless dialog backend
    ///
    /// The daemon runs display-less and auto-accepts its own questions; a
    /// desktop build passes its toolkit's backend to
    /// [`start_with_backend`](Studio::start_with_backend) instead.
    pub fn start(config: StudioConfig) -> Result<Self, StudioError> {
        Self::start_with_backend(config, SimDialogBackend::new().with_answer(ACCEPT_OPTION))
    }

    /// Starts the studio over a caller-chosen dialog backend
    pub fn start_with_backend<B: DialogBackend>(
        config: StudioConfig,
        backend: B,
    ) -> Result<Self, StudioError> {
        let mut generator = ProcessWorker::new(worker_command(&config)?);
        generator.start()?;

        let dialog = DialogThread::start(backend)?;

        let (change_tx, changes) = unbounded();
        let watch = ScoreWatcher::new(&config.score)
            .with_poll(config.poll)
            .spawn(move |path: &Path| {
                // The pipeline runs on the studio's loop, not on the
                // watcher thread.
                let _ = change_tx.send(path.to_path_buf());
            })?;

        info!(
            "studio started: watching {} (model {})",
            config.score.display(),
            config.model_dir.display()
        );
        Ok(Self {
            config,
            generator,
            dialog,
            watch: Some(watch),
            changes,
            model_loaded: false,
        })
    }

    /// The watched score path
    pub fn score(&self) -> &Path {
        &self.config.score
    }

    /// Runs the change pipeline until `quit` fires
    ///
    /// A failed pipeline pass is logged and survived; the next change
    /// starts fresh.
    pub fn run(&mut self, quit: Receiver<()>) -> Result<(), StudioError> {
        let changes = self.changes.clone();
        loop {
            crossbeam_channel::select! {
                recv(changes) -> change => match change {
                    Ok(path) => {
                        if let Err(err) = self.handle_change(&path) {
                            warn!("change pipeline failed: {}", err);
                        }
                    }
                    Err(_) => break,
                },
                recv(quit) -> _msg => break,
            }
        }
        Ok(())
    }

    /// One watcher edge: confirm, ensure the model, generate, save
    fn handle_change(&mut self, path: &Path) -> Result<(), StudioError> {
        info!("score changed: {}", path.display());

        if !self.confirm_generation(path)? {
            debug!("generation declined for {}", path.display());
            return Ok(());
        }

        self.ensure_model()?;
        let input = self.read_score()?;

        let dialog = self.dialog.actor()?;
        dialog.invoke_failing(
            OPEN_PROGRESS,
            DialogCmd::OpenProgress(ProgressSpec::new(
                "Generating voices",
                format!("Generating {} variations of {}", self.config.batch, input.name),
                self.config.batch as u32,
            )),
        )?;
        let outcome = self.generate_and_save(&input);
        // The surface closes whether or not generation succeeded.
        dialog.invoke_failing(CLOSE_PROGRESS, DialogCmd::CloseProgress)?;

        if let Some(lead) = outcome? {
            self.resave_score(&lead)?;
        }
        Ok(())
    }

    /// Asks whether the change should start a generation round
    fn confirm_generation(&self, path: &Path) -> Result<bool, StudioError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let reply = self.dialog.actor()?.invoke_failing(
            SHOW_QUESTION,
            DialogCmd::ShowQuestion {
                title: "Score changed".to_string(),
                text: format!("Generate counterpoint voices for {}?", name),
                options: vec![ACCEPT_OPTION.to_string(), DECLINE_OPTION.to_string()],
            },
        )?;
        match reply {
            DialogCmd::QuestionAnswer(answer) => Ok(answer == ACCEPT_OPTION),
            other => Err(StudioError::Protocol(format!("{:?}", other))),
        }
    }

    /// Loads the model on first use
    fn ensure_model(&mut self) -> Result<(), StudioError> {
        if self.model_loaded {
            return Ok(());
        }
        let reply = self
            .generator
            .actor()?
            .invoke_failing(LOAD, GeneratorCmd::Load(self.config.model_dir.clone()))?;
        match reply {
            GeneratorCmd::LoadDone => {
                info!("model loaded from {}", self.config.model_dir.display());
                self.model_loaded = true;
                Ok(())
            }
            other => Err(StudioError::Protocol(format!("{:?}", other))),
        }
    }

    /// Reads the watched score into an artifact named after its stem
    fn read_score(&self) -> Result<ScoreArtifact, StudioError> {
        let data = fs::read(&self.config.score).map_err(|source| StudioError::ScoreRead {
            path: self.config.score.clone(),
            source,
        })?;
        let name = self
            .config
            .score
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "score".to_string());
        Ok(ScoreArtifact::new(name, data))
    }

    /// Generates variations and writes them next to the score
    ///
    /// Each written variation advances the progress surface by one.
    /// Returns the lead variation for the score resave.
    fn generate_and_save(&self, input: &ScoreArtifact) -> Result<Option<ScoreArtifact>, StudioError> {
        let reply = self.generator.actor()?.invoke_failing(
            GENERATE,
            GeneratorCmd::Generate {
                artifact: input.clone(),
                batch: self.config.batch,
            },
        )?;
        let variations = match reply {
            GeneratorCmd::Generated(variations) => variations,
            other => return Err(StudioError::Protocol(format!("{:?}", other))),
        };

        let dialog = self.dialog.actor()?;
        for (index, variation) in variations.iter().enumerate() {
            let path = variation_path(&self.config.score, variation);
            fs::write(&path, &variation.data).map_err(|source| StudioError::ArtifactWrite {
                path: path.clone(),
                source,
            })?;
            info!("wrote {}", path.display());
            dialog.invoke_failing(
                UPDATE_PROGRESS,
                DialogCmd::UpdateProgress(index as u32 + 1),
            )?;
        }
        Ok(variations.into_iter().next())
    }

    /// Replaces the watched score with the lead variation without
    /// tripping the watcher
    fn resave_score(&self, lead: &ScoreArtifact) -> Result<(), StudioError> {
        let watch = match &self.watch {
            Some(watch) => watch,
            None => return Ok(()),
        };
        watch
            .silenced_write(|| fs::write(&self.config.score, &lead.data))?
            .map_err(|source| StudioError::ArtifactWrite {
                path: self.config.score.clone(),
                source,
            })?;
        info!("score updated with {}", lead.name);
        Ok(())
    }

    /// Stops the watcher, then both actors, waiting for each in turn
    pub fn shutdown(mut self) -> Result<(), StudioError> {
        // The watcher goes first so no new change can land mid-teardown.
        if let Some(watch) = self.watch.take() {
            watch.stop()?;
        }
        self.dialog.shutdown()?;
        self.generator
            .shutdown(GENERATOR_EXIT, GeneratorCmd::Exit)?;
        info!("studio stopped");
        Ok(())
    }
}

/// Builds the generator worker invocation
///
/// The worker is this same binary re-run with `--generator-worker`, unless
/// the configuration points at a dedicated one.
fn worker_command(config: &StudioConfig) -> Result<OsCommand, StudioError> {
    let program = match &config.worker_cmd {
        Some(program) => program.clone(),
        None => env::current_exe().map_err(|err| {
            StudioError::Worker(WorkerError::Spawn(format!(
                "cannot locate own binary: {}",
                err
            )))
        })?,
    };
    let mut command = OsCommand::new(program);
    command.arg("--generator-worker");
    Ok(command)
}

/// Where a variation lands: next to the score, named after itself
fn variation_path(score: &Path, variation: &ScoreArtifact) -> PathBuf {
    score.with_file_name(format!("{}.mid", variation.name))
}

/// The subprocess entry behind `--generator-worker`
///
/// Builds the far actor over this process's stdio and serves generator
/// commands until the exit exchange. Stdout belongs to the frame stream;
/// logging goes to stderr.
pub fn run_generator_worker() -> Result<(), StudioError> {
    let actor = stdio_worker_actor::<GeneratorCmd>()?;
    GeneratorRoutine::new(SimModelBackend).run(actor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert_eq!(config.score, PathBuf::from("score.mid"));
        assert_eq!(config.model_dir, PathBuf::from("model"));
        assert_eq!(config.poll, Duration::from_millis(200));
        assert_eq!(config.batch, 2);
        assert!(config.worker_cmd.is_none());
        assert!(!config.generator_worker);
    }

    #[test]
    fn test_worker_command_prefers_configured_binary() {
        let config = StudioConfig {
            worker_cmd: Some(PathBuf::from("/opt/bin/generator")),
            ..StudioConfig::default()
        };
        let command = worker_command(&config).unwrap();
        assert_eq!(command.get_program(), "/opt/bin/generator");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, [OsStr::new("--generator-worker")]);
    }

    #[test]
    fn test_variation_path_lands_next_to_score() {
        let score = Path::new("/tmp/studio/melody.mid");
        let variation = ScoreArtifact::new("melody-v1", vec![1]);
        assert_eq!(
            variation_path(score, &variation),
            Path::new("/tmp/studio/melody-v1.mid")
        );
    }

    #[test]
    fn test_start_reports_missing_worker_binary() {
        let dir = tempfile::tempdir().unwrap();
        let score = dir.path().join("melody.mid");
        fs::write(&score, b"MThd").unwrap();
        let config = StudioConfig {
            score,
            model_dir: dir.path().join("model"),
            worker_cmd: Some(PathBuf::from("/nonexistent/generator-worker")),
            ..StudioConfig::default()
        };

        let err = match Studio::start_with_backend(config, SimDialogBackend::new()) {
            Ok(_) => panic!("start unexpectedly succeeded"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            StudioError::Worker(WorkerError::Spawn(_))
        ));
    }
}

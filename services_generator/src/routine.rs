//! The generation worker's command loop

use crate::model::{GenerativeModel, ModelBackend};
use crate::protocol::{GeneratorCmd, ModelState, EXIT, GENERATE, LOAD, QUERY_STATE};
use channel::{ChannelActor, ChannelError};
use log::{info, warn};
use std::time::Duration;
use worker::WorkerRoutine;

const POLL_TICK: Duration = Duration::from_millis(5);

/// Routine servicing the generator vocabulary until exit
///
/// Commands are polled in a fixed priority: an exit request always wins
/// over queued work, then load, generate, and state queries. One model at a
/// time; loading again drops the old model before the new one is ready, so
/// a failed reload leaves the worker empty rather than stale.
pub struct GeneratorRoutine<B: ModelBackend> {
    backend: B,
}

impl<B: ModelBackend> GeneratorRoutine<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn serve(self, actor: &ChannelActor<GeneratorCmd>) -> Result<(), ChannelError> {
        let mut model: Option<Box<dyn GenerativeModel>> = None;
        info!("generator loop started");
        loop {
            if let Some(action) = actor.invoked(EXIT)? {
                info!("generator exiting");
                return action.finish(GeneratorCmd::ExitDone);
            }

            if let Some(action) = actor.invoked(LOAD)? {
                model = None;
                let dir = match action.parameter() {
                    GeneratorCmd::Load(dir) => dir.clone(),
                    other => {
                        warn!("malformed load request: {:?}", other);
                        action.fail("malformed load request")?;
                        continue;
                    }
                };
                match self.backend.load(&dir) {
                    Ok(loaded) => {
                        info!("model loaded from {}", dir.display());
                        model = Some(loaded);
                        action.finish(GeneratorCmd::LoadDone)?;
                    }
                    Err(err) => {
                        warn!("model load failed: {}", err);
                        action.fail(err.to_string())?;
                    }
                }
                continue;
            }

            if let Some(action) = actor.invoked(GENERATE)? {
                let (artifact, batch) = match action.parameter() {
                    GeneratorCmd::Generate { artifact, batch } => (artifact.clone(), *batch),
                    other => {
                        warn!("malformed generate request: {:?}", other);
                        action.fail("malformed generate request")?;
                        continue;
                    }
                };
                let loaded = match model.as_ref() {
                    Some(loaded) => loaded,
                    None => {
                        action.fail("no model loaded")?;
                        continue;
                    }
                };
                if artifact.data.is_empty() {
                    action.fail("invalid input artifact")?;
                    continue;
                }
                match loaded.generate(&artifact, batch) {
                    Ok(artifacts) => {
                        info!("generated {} artifacts from {:?}", artifacts.len(), artifact.name);
                        action.finish(GeneratorCmd::Generated(artifacts))?;
                    }
                    Err(err) => {
                        warn!("generation failed: {}", err);
                        action.fail(err.to_string())?;
                    }
                }
                continue;
            }

            if let Some(action) = actor.invoked(QUERY_STATE)? {
                let state = if model.is_some() {
                    ModelState::Loaded
                } else {
                    ModelState::Empty
                };
                action.finish(GeneratorCmd::StateIs(state))?;
                continue;
            }

            std::thread::sleep(POLL_TICK);
        }
    }
}

impl<B: ModelBackend> WorkerRoutine<GeneratorCmd> for GeneratorRoutine<B> {
    fn run(self, actor: ChannelActor<GeneratorCmd>) {
        if let Err(err) = self.serve(&actor) {
            warn!("generator loop ended abnormally: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SimModelBackend;
    use crate::protocol::ScoreArtifact;
    use channel::CommandChannel;
    use std::thread;

    fn run_with_client<F, T>(client: F) -> T
    where
        F: FnOnce(ChannelActor<GeneratorCmd>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (near, far) = CommandChannel::unbounded().split();
        let driver = thread::spawn(move || client(near));
        GeneratorRoutine::new(SimModelBackend).run(far);
        driver.join().unwrap()
    }

    #[test]
    fn test_load_query_generate_exit() {
        let model_dir = tempfile::tempdir().unwrap();
        let artifacts = run_with_client(move |near| {
            let reply = near
                .invoke_failing(LOAD, GeneratorCmd::Load(model_dir.path().to_path_buf()))
                .unwrap();
            assert_eq!(reply, GeneratorCmd::LoadDone);

            let reply = near
                .invoke_failing(QUERY_STATE, GeneratorCmd::StateQuery)
                .unwrap();
            assert_eq!(reply, GeneratorCmd::StateIs(ModelState::Loaded));

            let reply = near
                .invoke_failing(
                    GENERATE,
                    GeneratorCmd::Generate {
                        artifact: ScoreArtifact::new("score", vec![1, 2, 3]),
                        batch: 2,
                    },
                )
                .unwrap();
            let artifacts = match reply {
                GeneratorCmd::Generated(artifacts) => artifacts,
                other => panic!("unexpected reply: {:?}", other),
            };

            let reply = near.invoke_failing(EXIT, GeneratorCmd::Exit).unwrap();
            assert_eq!(reply, GeneratorCmd::ExitDone);
            artifacts
        });

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].name, "score-v1");
        assert_eq!(artifacts[1].name, "score-v2");
    }

    #[test]
    fn test_generate_without_model_fails() {
        run_with_client(|near| {
            let err = near
                .invoke_failing(
                    GENERATE,
                    GeneratorCmd::Generate {
                        artifact: ScoreArtifact::new("score", vec![1]),
                        batch: 1,
                    },
                )
                .unwrap_err();
            assert_eq!(err.to_string(), "command Cmd(4): no model loaded");

            near.invoke_failing(EXIT, GeneratorCmd::Exit).unwrap();
        });
    }

    #[test]
    fn test_failed_reload_leaves_the_worker_empty() {
        let model_dir = tempfile::tempdir().unwrap();
        run_with_client(move |near| {
            near.invoke_failing(LOAD, GeneratorCmd::Load(model_dir.path().to_path_buf()))
                .unwrap();

            let err = near
                .invoke_failing(LOAD, GeneratorCmd::Load("/nonexistent/model".into()))
                .unwrap_err();
            assert!(err.to_string().contains("model directory not found"));

            let reply = near
                .invoke_failing(QUERY_STATE, GeneratorCmd::StateQuery)
                .unwrap();
            assert_eq!(reply, GeneratorCmd::StateIs(ModelState::Empty));

            near.invoke_failing(EXIT, GeneratorCmd::Exit).unwrap();
        });
    }

    #[test]
    fn test_empty_artifact_is_refused() {
        let model_dir = tempfile::tempdir().unwrap();
        run_with_client(move |near| {
            near.invoke_failing(LOAD, GeneratorCmd::Load(model_dir.path().to_path_buf()))
                .unwrap();

            let err = near
                .invoke_failing(
                    GENERATE,
                    GeneratorCmd::Generate {
                        artifact: ScoreArtifact::new("empty", vec![]),
                        batch: 1,
                    },
                )
                .unwrap_err();
            assert_eq!(err.to_string(), "command Cmd(4): invalid input artifact");

            near.invoke_failing(EXIT, GeneratorCmd::Exit).unwrap();
        });
    }

    #[test]
    fn test_exit_outranks_queued_work() {
        let (near, far) = CommandChannel::unbounded().split();
        near.send(GeneratorCmd::Generate {
            artifact: ScoreArtifact::new("late", vec![1]),
            batch: 1,
        })
        .unwrap();
        near.send(GeneratorCmd::Exit).unwrap();

        GeneratorRoutine::new(SimModelBackend).run(far);

        let reply = near.receive_value(EXIT.response).unwrap();
        assert_eq!(reply.into_result().unwrap(), GeneratorCmd::ExitDone);
        // The queued generate was never answered; the loop is gone.
        assert_eq!(
            near.receive_nowait().unwrap_err(),
            ChannelError::Disconnected
        );
    }
}

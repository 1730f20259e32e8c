//! The dialog actor's pump loop and thread wrapper

use crate::backend::{DialogBackend, DialogError};
use crate::protocol::{
    DialogCmd, CLOSE_PROGRESS, EXIT, OPEN_PROGRESS, SHOW_MESSAGE, SHOW_QUESTION, UPDATE_PROGRESS,
};
use channel::{ChannelActor, ChannelError};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use worker::{ThreadWorker, WorkerError, WorkerRoutine};

/// Pacing of the outer pump loop
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Routine pumping dialog commands at a fixed tick
///
/// Handlers for the five dialog exchanges are registered up front; the loop
/// then alternates an exit poll with one dispatch pass per tick. The open
/// handler blocks inside the backend's modal loop for as long as its
/// surface stays open, pumping nested dispatch passes so updates and the
/// close itself keep flowing.
pub struct DialogLoop<B: DialogBackend> {
    backend: B,
    tick: Duration,
    ready: Option<crossbeam_channel::Sender<()>>,
}

impl<B: DialogBackend> DialogLoop<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tick: DEFAULT_TICK,
            ready: None,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Signals `ready` once handlers are registered and the loop is live
    pub fn with_ready(mut self, ready: crossbeam_channel::Sender<()>) -> Self {
        self.ready = Some(ready);
        self
    }

    fn register_handlers(backend: &Arc<B>, actor: &ChannelActor<DialogCmd>) {
        let b = Arc::clone(backend);
        actor.register(SHOW_MESSAGE, move |_, action| {
            let (title, text) = match action.parameter() {
                DialogCmd::ShowMessage { title, text } => (title.clone(), text.clone()),
                other => {
                    warn!("malformed message request: {:?}", other);
                    return action.fail("malformed message request");
                }
            };
            match b.show_message(&title, &text) {
                Ok(()) => action.finish(DialogCmd::MessageAnswer),
                Err(err) => action.fail(err.to_string()),
            }
        });

        let b = Arc::clone(backend);
        actor.register(SHOW_QUESTION, move |_, action| {
            let (title, text, options) = match action.parameter() {
                DialogCmd::ShowQuestion {
                    title,
                    text,
                    options,
                } => (title.clone(), text.clone(), options.clone()),
                other => {
                    warn!("malformed question request: {:?}", other);
                    return action.fail("malformed question request");
                }
            };
            match b.show_question(&title, &text, &options) {
                Ok(answer) => action.finish(DialogCmd::QuestionAnswer(answer)),
                Err(err) => action.fail(err.to_string()),
            }
        });

        let b = Arc::clone(backend);
        actor.register(OPEN_PROGRESS, move |actor, action| {
            let spec = match action.parameter() {
                DialogCmd::OpenProgress(spec) => spec.clone(),
                other => {
                    warn!("malformed open request: {:?}", other);
                    return action.fail("malformed open request");
                }
            };
            if b.progress_open() {
                return action.fail(DialogError::AlreadyOpen.to_string());
            }
            if let Err(err) = b.open_progress(&spec) {
                return action.fail(err.to_string());
            }
            debug!("progress surface open: {:?}", spec.title);

            // The opener gets its acknowledgment while the surface stays
            // open; everything after this line runs inside the modal wait.
            action.finish(DialogCmd::ProgressOpened)?;
            let modal = b.run_progress_modal(&mut || {
                actor
                    .handle_invocations()
                    .map(|_| ())
                    .map_err(DialogError::from)
            });
            match modal {
                Ok(()) => {
                    debug!("progress surface closed");
                    Ok(())
                }
                Err(DialogError::Channel(err)) => Err(err),
                Err(err) => {
                    warn!("modal loop failed: {}", err);
                    let _ = b.close_progress();
                    Ok(())
                }
            }
        });

        let b = Arc::clone(backend);
        actor.register(UPDATE_PROGRESS, move |_, action| {
            let value = match action.parameter() {
                DialogCmd::UpdateProgress(value) => *value,
                other => {
                    warn!("malformed update request: {:?}", other);
                    return action.fail("malformed update request");
                }
            };
            if !b.progress_open() {
                return action.fail(DialogError::NotOpen.to_string());
            }
            match b.set_progress(value) {
                Ok(()) => action.finish(DialogCmd::ProgressUpdated),
                Err(err) => action.fail(err.to_string()),
            }
        });

        let b = Arc::clone(backend);
        actor.register(CLOSE_PROGRESS, move |_, action| {
            if !b.progress_open() {
                return action.fail(DialogError::NotOpen.to_string());
            }
            match b.close_progress() {
                // The close is acknowledged first; the modal loop notices
                // the closed surface on its next check and unwinds.
                Ok(()) => action.finish(DialogCmd::ProgressClosed),
                Err(err) => action.fail(err.to_string()),
            }
        });
    }

    fn serve(
        backend: Arc<B>,
        tick: Duration,
        ready: Option<crossbeam_channel::Sender<()>>,
        actor: &ChannelActor<DialogCmd>,
    ) -> Result<(), ChannelError> {
        Self::register_handlers(&backend, actor);
        info!("dialog pump started");
        if let Some(ready) = ready {
            let _ = ready.send(());
        }
        loop {
            if let Some(action) = actor.invoked(EXIT)? {
                info!("dialog pump exiting");
                return action.finish(DialogCmd::ExitDone);
            }
            actor.handle_invocations()?;
            std::thread::sleep(tick);
        }
    }
}

impl<B: DialogBackend> WorkerRoutine<DialogCmd> for DialogLoop<B> {
    fn run(self, actor: ChannelActor<DialogCmd>) {
        let DialogLoop {
            backend,
            tick,
            ready,
        } = self;
        if let Err(err) = Self::serve(Arc::new(backend), tick, ready, &actor) {
            warn!("dialog pump ended abnormally: {}", err);
        }
    }
}

/// The dialog actor's thread, with a synchronous start barrier
///
/// `start` returns only once the pump has registered its handlers and is
/// servicing commands, so a caller may invoke immediately after.
pub struct DialogThread {
    worker: ThreadWorker<DialogCmd>,
}

impl DialogThread {
    pub fn start<B: DialogBackend>(backend: B) -> Result<Self, DialogError> {
        Self::start_with_tick(backend, DEFAULT_TICK)
    }

    pub fn start_with_tick<B: DialogBackend>(
        backend: B,
        tick: Duration,
    ) -> Result<Self, DialogError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(0);
        let mut worker = ThreadWorker::new("dialog-pump");
        worker.start(DialogLoop::new(backend).with_tick(tick).with_ready(ready_tx))?;
        ready_rx.recv().map_err(|_| {
            DialogError::Worker(WorkerError::Spawn(
                "dialog pump never became ready".to_string(),
            ))
        })?;
        Ok(Self { worker })
    }

    pub fn actor(&self) -> Result<&ChannelActor<DialogCmd>, DialogError> {
        Ok(self.worker.actor()?)
    }

    /// Invokes the exit exchange and joins the pump thread
    pub fn shutdown(&mut self) -> Result<(), DialogError> {
        self.worker.shutdown(EXIT, DialogCmd::Exit)?;
        Ok(())
    }
}

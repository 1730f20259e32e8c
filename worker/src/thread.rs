//! Thread-backed workers over in-process pairs

use crate::{WorkerError, WorkerRoutine, WorkerState};
use channel::{ChannelActor, Command, CommandChannel, TagPair};
use log::debug;
use std::thread::JoinHandle;

/// A worker running its routine on a named background thread
///
/// The pair is created up front, unbounded; `start` splits it and moves the
/// far actor into the thread together with the routine.
pub struct ThreadWorker<P: Command> {
    name: String,
    state: WorkerState,
    channel: Option<CommandChannel<P>>,
    near: Option<ChannelActor<P>>,
    handle: Option<JoinHandle<()>>,
}

impl<P: Command> ThreadWorker<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WorkerState::Created,
            channel: Some(CommandChannel::unbounded()),
            near: None,
            handle: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Spawns the thread and hands the far actor to `routine`
    pub fn start<R>(&mut self, routine: R) -> Result<(), WorkerError>
    where
        R: WorkerRoutine<P>,
    {
        let channel = self.channel.take().ok_or(WorkerError::AlreadyStarted)?;
        let (near, far) = channel.split();
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || routine.run(far))
            .map_err(|err| WorkerError::Spawn(err.to_string()))?;
        debug!("worker thread {:?} started", self.name);
        self.near = Some(near);
        self.handle = Some(handle);
        self.state = WorkerState::Started;
        Ok(())
    }

    /// The spawner's endpoint of the worker's pair
    pub fn actor(&self) -> Result<&ChannelActor<P>, WorkerError> {
        self.near.as_ref().ok_or(WorkerError::NotStarted)
    }

    /// Invokes the routine's exit command, then joins the thread
    ///
    /// The invoke doubles as the shutdown barrier: it returns only once the
    /// routine has reached and acknowledged the exit request, so the join
    /// that follows cannot block on a loop that never ends.
    pub fn shutdown(&mut self, exit: TagPair, request: P) -> Result<(), WorkerError> {
        let near = self.near.as_ref().ok_or(WorkerError::NotStarted)?;
        self.state = WorkerState::ExitRequested;
        near.invoke(exit, request)?;
        let handle = self.handle.take().ok_or(WorkerError::NotStarted)?;
        handle.join().map_err(|_| WorkerError::Panicked)?;
        debug!("worker thread {:?} joined", self.name);
        self.near = None;
        self.state = WorkerState::Terminated;
        Ok(())
    }
}

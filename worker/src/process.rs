//! Process-backed workers over stdio stream pairs

use crate::{WorkerError, WorkerState};
use channel::{stream_actor, ActorRole, ChannelActor, Command, TagPair};
use log::{debug, warn};
use std::io;
use std::process::{Child, Command as OsCommand, Stdio};

/// A worker running as a child process
///
/// The pair runs over the child's stdio: our writes land on its stdin, its
/// stdout feeds our reads. The child's stderr stays inherited so its log
/// output interleaves with ours.
pub struct ProcessWorker<P: Command> {
    command: OsCommand,
    state: WorkerState,
    child: Option<Child>,
    near: Option<ChannelActor<P>>,
}

impl<P: Command> ProcessWorker<P> {
    /// Wraps a configured command; stdio piping is set up here
    pub fn new(mut command: OsCommand) -> Self {
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        Self {
            command,
            state: WorkerState::Created,
            child: None,
            near: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Spawns the child and builds the near actor over its stdio
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.child.is_some() || self.state != WorkerState::Created {
            return Err(WorkerError::AlreadyStarted);
        }
        let mut child = self
            .command
            .spawn()
            .map_err(|err| WorkerError::Spawn(err.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Process("child stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Process("child stdout not piped".to_string()))?;
        let near = stream_actor(ActorRole::Sender, stdout, stdin)?;
        debug!("worker process started (pid {})", child.id());
        self.child = Some(child);
        self.near = Some(near);
        self.state = WorkerState::Started;
        Ok(())
    }

    /// The spawner's endpoint of the worker's pair
    pub fn actor(&self) -> Result<&ChannelActor<P>, WorkerError> {
        self.near.as_ref().ok_or(WorkerError::NotStarted)
    }

    /// Invokes the routine's exit command, then waits for the child
    ///
    /// Same barrier as the thread variant: the exit acknowledgment proves
    /// the child's loop ended before we wait on the process.
    pub fn shutdown(&mut self, exit: TagPair, request: P) -> Result<(), WorkerError> {
        let near = self.near.as_ref().ok_or(WorkerError::NotStarted)?;
        self.state = WorkerState::ExitRequested;
        near.invoke(exit, request)?;

        // Dropping the actor closes the child's stdin.
        self.near = None;
        let mut child = self.child.take().ok_or(WorkerError::NotStarted)?;
        let status = child
            .wait()
            .map_err(|err| WorkerError::Process(err.to_string()))?;
        if !status.success() {
            warn!("worker process exited with {}", status);
        }
        self.state = WorkerState::Terminated;
        Ok(())
    }
}

impl<P: Command> Drop for ProcessWorker<P> {
    /// Best-effort kill for a worker dropped without shutdown
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Builds the worker-side actor of a stdio pair
///
/// Called from the subprocess entry point before the routine loop starts.
/// The process must not print anything else to stdout afterwards; frames
/// own that stream.
pub fn stdio_worker_actor<P: Command>() -> Result<ChannelActor<P>, WorkerError> {
    let actor = stream_actor(ActorRole::Receiver, io::stdin(), io::stdout())?;
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    const STOP: TagPair = TagPair::new(0, 1);

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    enum NoopCmd {
        Stop,
        Stopped,
    }

    impl Command for NoopCmd {
        fn tag(&self) -> channel::CommandTag {
            match self {
                NoopCmd::Stop => STOP.request,
                NoopCmd::Stopped => STOP.response,
            }
        }
    }

    #[test]
    fn test_created_worker_refuses_channel_operations() {
        let mut worker: ProcessWorker<NoopCmd> = ProcessWorker::new(OsCommand::new("true"));
        assert_eq!(worker.state(), WorkerState::Created);
        assert_eq!(worker.actor().unwrap_err(), WorkerError::NotStarted);
        assert_eq!(
            worker.shutdown(STOP, NoopCmd::Stop).unwrap_err(),
            WorkerError::NotStarted
        );
    }

    #[test]
    fn test_spawn_failure_names_the_command() {
        let mut worker: ProcessWorker<NoopCmd> =
            ProcessWorker::new(OsCommand::new("/nonexistent/worker-binary"));
        match worker.start().unwrap_err() {
            WorkerError::Spawn(_) => {}
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(worker.state(), WorkerState::Created);
    }
}

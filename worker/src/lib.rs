//! # Worker Lifecycle
//!
//! Spawns execution contexts that own one channel endpoint each and service
//! commands until told to exit. Two variants share one lifecycle:
//!
//! - [`ThreadWorker`] runs a routine on a background thread over an
//!   in-process pair.
//! - [`ProcessWorker`] runs a child process and speaks a stream pair over
//!   its stdio.
//!
//! ## Philosophy
//!
//! - **The exit exchange is the barrier.** Shutdown invokes the routine's
//!   exit command and blocks for the acknowledgment, so by the time the
//!   context is joined the routine has provably finished its loop.
//! - **The spawner keeps the near actor.** The far actor crosses the
//!   boundary exactly once, at start; afterwards the only connection is
//!   the pair itself.

mod process;
mod thread;

pub use process::{stdio_worker_actor, ProcessWorker};
pub use thread::ThreadWorker;

use channel::{ChannelActor, ChannelError, Command};
use thiserror::Error;

/// Lifecycle states of a worker entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed; no context exists yet
    Created,
    /// Context spawned, command loop running
    Started,
    /// Exit command sent, acknowledgment pending or received
    ExitRequested,
    /// Context joined; the worker is gone
    Terminated,
}

impl WorkerState {
    /// Checks whether the command loop is live
    pub fn is_running(&self) -> bool {
        matches!(self, WorkerState::Started)
    }

    /// Checks whether the worker is in its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

/// Errors surfaced by worker lifecycle operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// `start` called on a worker that already started once
    #[error("worker already started")]
    AlreadyStarted,

    /// An operation that needs a running context found none
    #[error("worker not started")]
    NotStarted,

    /// The OS refused to create the context
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    /// The context ended abnormally instead of being joined
    #[error("worker context panicked")]
    Panicked,

    /// The child process could not be wired up or waited on
    #[error("worker process error: {0}")]
    Process(String),

    /// The exit exchange or other channel traffic failed
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// The command loop run on the far side of a worker's pair
///
/// Implementations loop over their known command tags until the exit
/// command arrives, finish its action as the acknowledgment, and return.
/// Closures taking the far actor implement this directly.
pub trait WorkerRoutine<P: Command>: Send + 'static {
    fn run(self, actor: ChannelActor<P>);
}

impl<P, F> WorkerRoutine<P> for F
where
    P: Command,
    F: FnOnce(ChannelActor<P>) + Send + 'static,
{
    fn run(self, actor: ChannelActor<P>) {
        self(actor)
    }
}

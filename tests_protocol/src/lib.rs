//! Protocol Test Utilities
//!
//! Shared vocabulary and spawn helpers for the cross-crate protocol tests.
//!
//! ## Test Philosophy
//!
//! - **Real threads, real pairs**: scenarios run against spawned workers,
//!   not hand-pumped loops
//! - **Typed vocabularies only**: every test speaks a closed command enum
//! - **Failures are data**: error paths assert on the failure the peer
//!   sent, not on local panics
//! - **Shutdown is part of the scenario**: every spawned worker ends with
//!   its exit exchange

use channel::{ChannelActor, ChannelError, Command, CommandTag, TagPair};
use log::warn;
use serde::{Deserialize, Serialize};
use services_generator::{GeneratorCmd, GeneratorRoutine, SimModelBackend};
use std::thread;
use std::time::Duration;
use worker::{ThreadWorker, WorkerError};

pub const ECHO: TagPair = TagPair::new(0, 1);
pub const SUM: TagPair = TagPair::new(2, 3);
pub const BOOM: TagPair = TagPair::new(4, 5);
pub const STOP: TagPair = TagPair::new(6, 7);

/// The closed command set of the probe worker
///
/// `Boom` always fails; its acknowledgment variant exists only to give
/// the response tag a payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeCmd {
    Echo(String),
    Echoed(String),
    Sum(Vec<i64>),
    Summed(i64),
    Boom,
    BoomAck,
    Stop,
    Stopped,
}

impl Command for ProbeCmd {
    fn tag(&self) -> CommandTag {
        match self {
            ProbeCmd::Echo(_) => ECHO.request,
            ProbeCmd::Echoed(_) => ECHO.response,
            ProbeCmd::Sum(_) => SUM.request,
            ProbeCmd::Summed(_) => SUM.response,
            ProbeCmd::Boom => BOOM.request,
            ProbeCmd::BoomAck => BOOM.response,
            ProbeCmd::Stop => STOP.request,
            ProbeCmd::Stopped => STOP.response,
        }
    }
}

/// Spawns the probe worker: echoes, sums, fails on demand, stops
pub fn spawn_probe_worker() -> Result<ThreadWorker<ProbeCmd>, WorkerError> {
    let mut worker = ThreadWorker::new("probe");
    worker.start(|actor: ChannelActor<ProbeCmd>| {
        if let Err(err) = probe_loop(&actor) {
            warn!("probe worker ended abnormally: {}", err);
        }
    })?;
    Ok(worker)
}

fn probe_loop(actor: &ChannelActor<ProbeCmd>) -> Result<(), ChannelError> {
    loop {
        if let Some(action) = actor.invoked(STOP)? {
            action.finish(ProbeCmd::Stopped)?;
            return Ok(());
        }
        if let Some(action) = actor.invoked(ECHO)? {
            let text = match action.parameter() {
                ProbeCmd::Echo(text) => text.clone(),
                _ => String::new(),
            };
            action.finish(ProbeCmd::Echoed(text))?;
            continue;
        }
        if let Some(action) = actor.invoked(SUM)? {
            let terms = match action.parameter() {
                ProbeCmd::Sum(terms) => terms.clone(),
                _ => Vec::new(),
            };
            action.finish(ProbeCmd::Summed(terms.iter().sum()))?;
            continue;
        }
        if let Some(action) = actor.invoked(BOOM)? {
            action.fail("boom")?;
            continue;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Spawns the real generation routine on a worker thread
pub fn spawn_generator_worker() -> Result<ThreadWorker<GeneratorCmd>, WorkerError> {
    let mut worker = ThreadWorker::new("generator");
    worker.start(GeneratorRoutine::new(SimModelBackend))?;
    Ok(worker)
}

//! # Generation Worker Service
//!
//! The command vocabulary and serving loop of the score generation worker.
//! The worker owns the far actor of one channel pair and cycles a priority
//! poll (exit, load, generate, state) until the exit command arrives. What
//! "generate" actually computes lives behind the [`ModelBackend`] seam.
//!
//! The same routine runs on a thread (tests) or in a subprocess (the
//! daemon's `--generator-worker` mode); the loop cannot tell the difference.

pub mod model;
pub mod protocol;
pub mod routine;

pub use model::{GenerativeModel, ModelBackend, ModelError, SimModelBackend};
pub use protocol::{
    GeneratorCmd, ModelState, ScoreArtifact, EXIT, GENERATE, LOAD, QUERY_STATE,
};
pub use routine::GeneratorRoutine;

//! # Counterpoint Studio Daemon
//!
//! This crate provides the studio daemon that watches a score file and
//! turns each edit into generated counterpoint voices.
//!
//! ## Philosophy
//!
//! - **One context, no globals**: every collaborator hangs off [`Studio`]
//! - **Services talk in commands**: dialog and generator are channel actors
//! - **The pipeline runs on one thread**: the watcher only reports edges
//! - **Generation is out of process**: a model crash cannot take the
//!   studio down
//! - **The studio's own saves are silent**: re-saving the score never
//!   triggers another round
//!
//! ## Responsibilities
//!
//! The daemon:
//! - Watches the score file for content changes
//! - Confirms each change through the dialog actor
//! - Keeps a generator worker process loaded and fed
//! - Writes generated variations next to the score and re-saves the
//!   score with the lead variation
//! - Doubles as the generator worker when run with `--generator-worker`
//!
//! ## Non-Responsibilities
//!
//! The daemon does NOT:
//! - Parse or validate MIDI; score bytes stay opaque
//! - Render dialogs; that is the [`DialogBackend`] seam's business
//! - Run model inference in-process
//!
//! [`DialogBackend`]: services_dialog::DialogBackend

pub mod studio;

pub use studio::{run_generator_worker, Studio, StudioConfig, StudioError};

//! # Dialog Actor Service
//!
//! The modal-dialog UI actor: a background thread pumping dispatch passes
//! at a fixed tick, serving message, question, and progress commands.
//!
//! The progress surface is the tricky customer. Its open handler blocks in
//! a modal loop for as long as the surface is up, and that loop pumps
//! nested dispatch passes, so a second caller's updates and the eventual
//! close are serviced without deadlock while the open exchange's handler
//! has still not returned. Rendering itself is behind the [`DialogBackend`]
//! seam; [`SimDialogBackend`] is the headless recorder used by tests and
//! display-less daemons.

pub mod backend;
pub mod protocol;
pub mod pump;

pub use backend::{DialogBackend, DialogError, SimDialogBackend};
pub use protocol::{
    DialogCmd, ProgressSpec, CLOSE_PROGRESS, EXIT, OPEN_PROGRESS, SHOW_MESSAGE, SHOW_QUESTION,
    UPDATE_PROGRESS,
};
pub use pump::{DialogLoop, DialogThread, DEFAULT_TICK};

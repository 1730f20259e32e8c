//! Dialog rendering seam
//!
//! Widget toolkits live behind [`DialogBackend`]. The pump loop decides
//! protocol legality (one progress surface at a time, no updates without an
//! open surface); the backend only renders and runs the modal wait. All
//! methods are called from the pump thread; implementations use interior
//! mutability, and the `Sync` bound exists because handlers hold the
//! backend through an `Arc`.

use crate::protocol::ProgressSpec;
use channel::ChannelError;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the dialog service
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    /// A second progress surface was requested while one is open
    #[error("progress surface already open")]
    AlreadyOpen,

    /// A progress update or close arrived with no surface open
    #[error("no progress surface open")]
    NotOpen,

    /// The rendering backend refused an operation
    #[error("dialog backend: {0}")]
    Backend(String),

    /// Channel traffic failed while pumping
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The pump thread could not be started or never became ready
    #[error(transparent)]
    Worker(#[from] worker::WorkerError),
}

/// Renders dialog surfaces for the pump loop
pub trait DialogBackend: Send + Sync + 'static {
    /// Shows a message surface and returns when it is dismissed
    fn show_message(&self, title: &str, text: &str) -> Result<(), DialogError>;

    /// Shows a question surface; returns the chosen option
    fn show_question(
        &self,
        title: &str,
        text: &str,
        options: &[String],
    ) -> Result<String, DialogError>;

    /// Opens the progress surface described by `spec`
    fn open_progress(&self, spec: &ProgressSpec) -> Result<(), DialogError>;

    /// Whether a progress surface is currently open
    fn progress_open(&self) -> bool;

    /// Moves the open progress surface to `value`
    fn set_progress(&self, value: u32) -> Result<(), DialogError>;

    /// Closes the open progress surface, ending its modal loop
    fn close_progress(&self) -> Result<(), DialogError>;

    /// Blocks while the progress surface is open, calling `pump` at the
    /// backend's own tick
    ///
    /// Reentrancy contract: `pump` dispatches channel traffic, which may
    /// call back into this backend (including [`close_progress`], which is
    /// what ends the wait). Implementations must not hold internal locks
    /// across the `pump` call.
    ///
    /// [`close_progress`]: DialogBackend::close_progress
    fn run_progress_modal(
        &self,
        pump: &mut dyn FnMut() -> Result<(), DialogError>,
    ) -> Result<(), DialogError>;
}

impl<B: DialogBackend + ?Sized> DialogBackend for std::sync::Arc<B> {
    fn show_message(&self, title: &str, text: &str) -> Result<(), DialogError> {
        (**self).show_message(title, text)
    }

    fn show_question(
        &self,
        title: &str,
        text: &str,
        options: &[String],
    ) -> Result<String, DialogError> {
        (**self).show_question(title, text, options)
    }

    fn open_progress(&self, spec: &ProgressSpec) -> Result<(), DialogError> {
        (**self).open_progress(spec)
    }

    fn progress_open(&self) -> bool {
        (**self).progress_open()
    }

    fn set_progress(&self, value: u32) -> Result<(), DialogError> {
        (**self).set_progress(value)
    }

    fn close_progress(&self) -> Result<(), DialogError> {
        (**self).close_progress()
    }

    fn run_progress_modal(
        &self,
        pump: &mut dyn FnMut() -> Result<(), DialogError>,
    ) -> Result<(), DialogError> {
        (**self).run_progress_modal(pump)
    }
}

#[derive(Debug, Default)]
struct SimDialogState {
    messages: Vec<(String, String)>,
    questions: Vec<(String, String, Vec<String>)>,
    progress_values: Vec<u32>,
    progress_spec: Option<ProgressSpec>,
    open: bool,
}

/// Headless backend that records every interaction
///
/// Messages auto-dismiss, questions answer themselves with the configured
/// answer (defaulting to the first option), and the modal wait is a plain
/// poll loop. Used by the tests and by the daemon when no display exists.
#[derive(Debug)]
pub struct SimDialogBackend {
    state: Mutex<SimDialogState>,
    answer: Option<String>,
    modal_tick: Duration,
}

impl Default for SimDialogBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(SimDialogState::default()),
            answer: None,
            modal_tick: Duration::from_millis(1),
        }
    }
}

impl SimDialogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every question with `answer` instead of the first option
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimDialogState> {
        // A poisoned lock means a panicked test; unwrapping keeps the
        // recorder honest instead of hiding the earlier failure.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.lock().messages.clone()
    }

    pub fn questions(&self) -> Vec<(String, String, Vec<String>)> {
        self.lock().questions.clone()
    }

    pub fn progress_values(&self) -> Vec<u32> {
        self.lock().progress_values.clone()
    }

    pub fn progress_spec(&self) -> Option<ProgressSpec> {
        self.lock().progress_spec.clone()
    }
}

impl DialogBackend for SimDialogBackend {
    fn show_message(&self, title: &str, text: &str) -> Result<(), DialogError> {
        self.lock().messages.push((title.to_string(), text.to_string()));
        Ok(())
    }

    fn show_question(
        &self,
        title: &str,
        text: &str,
        options: &[String],
    ) -> Result<String, DialogError> {
        self.lock()
            .questions
            .push((title.to_string(), text.to_string(), options.to_vec()));
        if let Some(answer) = &self.answer {
            return Ok(answer.clone());
        }
        options
            .first()
            .cloned()
            .ok_or_else(|| DialogError::Backend("question offered no options".to_string()))
    }

    fn open_progress(&self, spec: &ProgressSpec) -> Result<(), DialogError> {
        let mut state = self.lock();
        state.progress_spec = Some(spec.clone());
        state.open = true;
        Ok(())
    }

    fn progress_open(&self) -> bool {
        self.lock().open
    }

    fn set_progress(&self, value: u32) -> Result<(), DialogError> {
        self.lock().progress_values.push(value);
        Ok(())
    }

    fn close_progress(&self) -> Result<(), DialogError> {
        self.lock().open = false;
        Ok(())
    }

    fn run_progress_modal(
        &self,
        pump: &mut dyn FnMut() -> Result<(), DialogError>,
    ) -> Result<(), DialogError> {
        while self.progress_open() {
            pump()?;
            std::thread::sleep(self.modal_tick);
        }
        Ok(())
    }
}

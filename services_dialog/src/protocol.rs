//! Dialog actor command vocabulary

use channel::{Command, CommandTag, TagPair};
use serde::{Deserialize, Serialize};

pub const SHOW_MESSAGE: TagPair = TagPair::new(0, 1);
pub const SHOW_QUESTION: TagPair = TagPair::new(2, 3);
pub const OPEN_PROGRESS: TagPair = TagPair::new(4, 5);
pub const UPDATE_PROGRESS: TagPair = TagPair::new(6, 7);
pub const CLOSE_PROGRESS: TagPair = TagPair::new(8, 9);
pub const EXIT: TagPair = TagPair::new(10, 11);

/// Parameters of a progress surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSpec {
    pub title: String,
    pub text: String,
    pub min: u32,
    pub max: u32,
    pub cancellable: bool,
}

impl ProgressSpec {
    pub fn new(title: impl Into<String>, text: impl Into<String>, max: u32) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            min: 0,
            max,
            cancellable: false,
        }
    }

    pub fn with_range(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }
}

/// The closed command set of a dialog actor pair
///
/// The progress exchanges are the interesting ones: `OpenProgress` is
/// acknowledged while its surface stays open, and `UpdateProgress` /
/// `CloseProgress` are serviced by the nested pump running inside the open
/// surface's modal loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogCmd {
    ShowMessage { title: String, text: String },
    MessageAnswer,
    ShowQuestion {
        title: String,
        text: String,
        options: Vec<String>,
    },
    QuestionAnswer(String),
    OpenProgress(ProgressSpec),
    ProgressOpened,
    UpdateProgress(u32),
    ProgressUpdated,
    CloseProgress,
    ProgressClosed,
    Exit,
    ExitDone,
}

impl Command for DialogCmd {
    fn tag(&self) -> CommandTag {
        match self {
            DialogCmd::ShowMessage { .. } => SHOW_MESSAGE.request,
            DialogCmd::MessageAnswer => SHOW_MESSAGE.response,
            DialogCmd::ShowQuestion { .. } => SHOW_QUESTION.request,
            DialogCmd::QuestionAnswer(_) => SHOW_QUESTION.response,
            DialogCmd::OpenProgress(_) => OPEN_PROGRESS.request,
            DialogCmd::ProgressOpened => OPEN_PROGRESS.response,
            DialogCmd::UpdateProgress(_) => UPDATE_PROGRESS.request,
            DialogCmd::ProgressUpdated => UPDATE_PROGRESS.response,
            DialogCmd::CloseProgress => CLOSE_PROGRESS.request,
            DialogCmd::ProgressClosed => CLOSE_PROGRESS.response,
            DialogCmd::Exit => EXIT.request,
            DialogCmd::ExitDone => EXIT.response,
        }
    }
}

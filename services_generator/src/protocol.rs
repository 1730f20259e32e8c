//! Generation worker command vocabulary

use channel::{Command, CommandTag, TagPair};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const LOAD: TagPair = TagPair::new(0, 1);
pub const QUERY_STATE: TagPair = TagPair::new(2, 3);
pub const GENERATE: TagPair = TagPair::new(4, 5);
pub const EXIT: TagPair = TagPair::new(6, 7);

/// Whether the worker currently holds a usable model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    Empty,
    Loaded,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Empty => write!(f, "empty"),
            ModelState::Loaded => write!(f, "loaded"),
        }
    }
}

/// An opaque score: a name and raw MIDI bytes
///
/// The channel never parses the bytes; MIDI structure is the editor's and
/// the model's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreArtifact {
    pub name: String,
    pub data: Vec<u8>,
}

impl ScoreArtifact {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// The closed command set of a generation worker pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorCmd {
    /// Load (or reload) the model found under a directory
    Load(PathBuf),
    LoadDone,
    /// Ask whether a model is loaded
    StateQuery,
    StateIs(ModelState),
    /// Produce `batch` variations of the input artifact
    Generate {
        artifact: ScoreArtifact,
        batch: usize,
    },
    Generated(Vec<ScoreArtifact>),
    /// End the command loop
    Exit,
    ExitDone,
}

impl Command for GeneratorCmd {
    fn tag(&self) -> CommandTag {
        match self {
            GeneratorCmd::Load(_) => LOAD.request,
            GeneratorCmd::LoadDone => LOAD.response,
            GeneratorCmd::StateQuery => QUERY_STATE.request,
            GeneratorCmd::StateIs(_) => QUERY_STATE.response,
            GeneratorCmd::Generate { .. } => GENERATE.request,
            GeneratorCmd::Generated(_) => GENERATE.response,
            GeneratorCmd::Exit => EXIT.request,
            GeneratorCmd::ExitDone => EXIT.response,
        }
    }
}

//! Model seam
//!
//! The command loop knows nothing about how scores are generated; it talks
//! to a [`ModelBackend`] that loads models and to the [`GenerativeModel`]s
//! it hands back. Real inference lives behind this seam. The crate ships
//! [`SimModelBackend`], a deterministic stand-in used by the tests and the
//! default daemon wiring.

use crate::protocol::ScoreArtifact;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised behind the model seam
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model directory not found: {}", .0.display())]
    MissingModelDir(PathBuf),

    #[error("model could not be loaded: {0}")]
    Load(String),

    #[error("generation failed: {0}")]
    Generate(String),
}

/// Loads models from a directory
pub trait ModelBackend: Send + 'static {
    fn load(&self, dir: &Path) -> Result<Box<dyn GenerativeModel>, ModelError>;
}

/// A loaded model producing score variations
pub trait GenerativeModel: Send + std::fmt::Debug {
    /// Produces `batch` variations of the input artifact
    ///
    /// The input has already been validated as non-empty by the loop.
    fn generate(&self, artifact: &ScoreArtifact, batch: usize)
        -> Result<Vec<ScoreArtifact>, ModelError>;
}

/// Deterministic placeholder backend
///
/// Loading checks that the model directory exists; generation returns
/// `batch` variations named `<name>-v1..`, each carrying the input bytes
/// plus a one-byte variation marker so every variation has distinct
/// content. Enough for the pipeline and the tests to move real bytes end
/// to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimModelBackend;

impl ModelBackend for SimModelBackend {
    fn load(&self, dir: &Path) -> Result<Box<dyn GenerativeModel>, ModelError> {
        if !dir.is_dir() {
            return Err(ModelError::MissingModelDir(dir.to_path_buf()));
        }
        Ok(Box::new(SimModel {
            dir: dir.to_path_buf(),
        }))
    }
}

#[derive(Debug)]
struct SimModel {
    dir: PathBuf,
}

impl GenerativeModel for SimModel {
    fn generate(
        &self,
        artifact: &ScoreArtifact,
        batch: usize,
    ) -> Result<Vec<ScoreArtifact>, ModelError> {
        if !self.dir.is_dir() {
            return Err(ModelError::Generate(format!(
                "model directory vanished: {}",
                self.dir.display()
            )));
        }
        Ok((1..=batch)
            .map(|index| {
                let mut data = artifact.data.clone();
                data.push(index as u8);
                ScoreArtifact::new(format!("{}-v{}", artifact.name, index), data)
            })
            .collect())
    }
}

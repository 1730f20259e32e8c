//! Channel error types

use crate::CommandFailure;
use thiserror::Error;

/// Errors surfaced by channel operations
///
/// A `Command` failure is local to one exchange and never poisons the
/// channel; `Disconnected` means the peer endpoint is gone for good.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer endpoint dropped its side of the pair
    #[error("channel disconnected")]
    Disconnected,

    /// The serving endpoint failed the exchange
    #[error("{0}")]
    Command(CommandFailure),

    /// A stream frame could not be encoded or decoded
    #[error("frame codec error: {0}")]
    Codec(String),

    /// The stream pump thread could not be started
    #[error("stream reader spawn failed: {0}")]
    Spawn(String),
}

impl From<CommandFailure> for ChannelError {
    fn from(failure: CommandFailure) -> Self {
        ChannelError::Command(failure)
    }
}

impl ChannelError {
    /// Returns the embedded command failure, if that is what this error is
    pub fn as_failure(&self) -> Option<&CommandFailure> {
        match self {
            ChannelError::Command(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandTag;

    #[test]
    fn test_failure_conversion_keeps_origin() {
        let failure = CommandFailure::new(CommandTag::new(2), "boom");
        let error: ChannelError = failure.clone().into();
        assert_eq!(error.as_failure(), Some(&failure));
        assert_eq!(error.to_string(), "command Cmd(2): boom");
    }

    #[test]
    fn test_disconnected_display() {
        assert_eq!(
            ChannelError::Disconnected.to_string(),
            "channel disconnected"
        );
    }
}

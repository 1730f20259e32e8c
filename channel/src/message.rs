//! Typed channel messages and the failure wrapper

use crate::CommandTag;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed command set carried by one channel
///
/// Each channel is generic over one payload enum in which every request kind
/// and every response kind is its own variant. The tag is derived from the
/// variant, so a message's tag can never disagree with its payload shape.
///
/// Payloads must be serializable because cross-process pairs move them over
/// a byte stream; in-process pairs never touch the codec.
pub trait Command: fmt::Debug + Serialize + DeserializeOwned + Send + 'static {
    /// Returns the tag identifying this payload's command kind
    fn tag(&self) -> CommandTag;
}

/// Failure raised by the serving endpoint of one exchange
///
/// Travels under the pair's response tag and records the originating request
/// tag, so a caller can tell which command failed even after filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    /// Tag of the request that failed
    pub origin: CommandTag,
    /// Human-readable failure description
    pub message: String,
}

impl CommandFailure {
    /// Creates a failure for the given originating request tag
    pub fn new(origin: CommandTag, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command {}: {}", self.origin, self.message)
    }
}

/// Either a domain value or a command failure
///
/// This is the explicit discriminated result the protocol carries instead of
/// smuggling failures through an untyped payload slot. A plain filtered
/// receive hands the enum back untouched; the failing variant converts a
/// `Failure` into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload<P> {
    /// Ordinary command payload
    Value(P),
    /// Failure wrapper produced by `CommandAction::fail`
    Failure(CommandFailure),
}

impl<P> Payload<P> {
    /// Returns whether this payload is the failure wrapper
    pub fn is_failure(&self) -> bool {
        matches!(self, Payload::Failure(_))
    }

    /// Converts into a result, surfacing the failure wrapper as an error
    pub fn into_result(self) -> Result<P, CommandFailure> {
        match self {
            Payload::Value(value) => Ok(value),
            Payload::Failure(failure) => Err(failure),
        }
    }
}

/// One message on the wire: a tag plus a typed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message<P> {
    /// Routing tag; derived from the payload for values, the pair's response
    /// tag for failures
    pub tag: CommandTag,
    /// The typed payload
    pub payload: Payload<P>,
}

impl<P: Command> Message<P> {
    /// Creates a value message; the tag comes from the payload itself
    pub fn value(payload: P) -> Self {
        Self {
            tag: payload.tag(),
            payload: Payload::Value(payload),
        }
    }

    /// Creates a failure message routed under `response_tag`
    pub fn failure(response_tag: CommandTag, failure: CommandFailure) -> Self {
        Self {
            tag: response_tag,
            payload: Payload::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestCmd, ECHO};

    #[test]
    fn test_value_message_tag_matches_payload() {
        let msg = Message::value(TestCmd::Echo("hi".to_string()));
        assert_eq!(msg.tag, ECHO.request);
        assert!(!msg.payload.is_failure());
    }

    #[test]
    fn test_failure_message_routes_under_response_tag() {
        let failure = CommandFailure::new(ECHO.request, "boom");
        let msg = Message::<TestCmd>::failure(ECHO.response, failure.clone());
        assert_eq!(msg.tag, ECHO.response);
        assert!(msg.payload.is_failure());
        assert_eq!(msg.payload.into_result(), Err(failure));
    }

    #[test]
    fn test_failure_display_names_origin_and_message() {
        let failure = CommandFailure::new(CommandTag::new(4), "no model loaded");
        assert_eq!(failure.to_string(), "command Cmd(4): no model loaded");
    }

    #[test]
    fn test_message_codec_roundtrip() {
        let msg = Message::value(TestCmd::Echo("payload".to_string()));
        let line = serde_json::to_string(&msg).unwrap();
        let back: Message<TestCmd> = serde_json::from_str(&line).unwrap();
        assert_eq!(back.tag, msg.tag);
        match back.payload {
            Payload::Value(TestCmd::Echo(text)) => assert_eq!(text, "payload"),
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}

//! Pending invocations awaiting a response

use crate::actor::SendHalf;
use crate::{ChannelError, Command, CommandFailure, Message, TagPair};

/// A received request that must be answered exactly once
///
/// An action is handed out by [`ChannelActor::invoked`] and by dispatch
/// passes. It owns the only path back to the invoker for this exchange:
/// consuming it with [`finish`] or [`fail`] is the response, and the type
/// cannot respond twice because both take the action by value.
///
/// [`ChannelActor::invoked`]: crate::ChannelActor::invoked
/// [`finish`]: CommandAction::finish
/// [`fail`]: CommandAction::fail
pub struct CommandAction<P: Command> {
    reply: SendHalf<P>,
    pair: TagPair,
    parameter: P,
}

impl<P: Command> CommandAction<P> {
    pub(crate) fn new(reply: SendHalf<P>, pair: TagPair, parameter: P) -> Self {
        Self {
            reply,
            pair,
            parameter,
        }
    }

    /// The request payload carried by the invocation
    pub fn parameter(&self) -> &P {
        &self.parameter
    }

    /// The tag pair this exchange runs under
    pub fn pair(&self) -> TagPair {
        self.pair
    }

    /// Answers the invoker with a success payload
    ///
    /// The payload must carry the pair's response tag.
    pub fn finish(self, value: P) -> Result<(), ChannelError> {
        debug_assert_eq!(
            value.tag(),
            self.pair.response,
            "response payload must carry the pair's response tag"
        );
        self.reply.send(Message::value(value))
    }

    /// Non-blocking [`finish`](CommandAction::finish); returns whether the
    /// response was accepted by the transport
    ///
    /// A `false` means the exchange produced no response at all, so the
    /// invoker keeps waiting. Callers on bounded transports must check it.
    pub fn finish_nowait(self, value: P) -> Result<bool, ChannelError> {
        debug_assert_eq!(
            value.tag(),
            self.pair.response,
            "response payload must carry the pair's response tag"
        );
        self.reply.try_send(Message::value(value))
    }

    /// Answers the invoker with a failure naming the request tag
    pub fn fail(self, message: impl Into<String>) -> Result<(), ChannelError> {
        let failure = CommandFailure::new(self.pair.request, message);
        self.reply
            .send(Message::failure(self.pair.response, failure))
    }

    /// Non-blocking [`fail`](CommandAction::fail); returns whether the
    /// response was accepted by the transport
    pub fn fail_nowait(self, message: impl Into<String>) -> Result<bool, ChannelError> {
        let failure = CommandFailure::new(self.pair.request, message);
        self.reply
            .try_send(Message::failure(self.pair.response, failure))
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{TestCmd, ECHO, SUM};
    use crate::{CommandChannel, Payload};

    #[test]
    fn test_finish_routes_the_response_tag() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel
            .sender()
            .send(TestCmd::Echo("hi".to_string()))
            .unwrap();

        let action = channel.receiver().invoked(ECHO).unwrap().unwrap();
        assert_eq!(action.pair(), ECHO);
        assert_eq!(action.parameter(), &TestCmd::Echo("hi".to_string()));
        action.finish(TestCmd::Echoed("hi".to_string())).unwrap();

        let reply = channel.sender().receive().unwrap();
        assert_eq!(reply.tag, ECHO.response);
        assert!(!reply.payload.is_failure());
    }

    #[test]
    fn test_fail_names_the_request_tag() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.sender().send(TestCmd::Sum(vec![])).unwrap();

        let action = channel.receiver().invoked(SUM).unwrap().unwrap();
        action.fail("nothing to add").unwrap();

        let reply = channel.sender().receive().unwrap();
        assert_eq!(reply.tag, SUM.response);
        match reply.payload {
            Payload::Failure(failure) => {
                assert_eq!(failure.origin, SUM.request);
                assert_eq!(failure.to_string(), "command Cmd(2): nothing to add");
            }
            Payload::Value(value) => panic!("expected failure, got {:?}", value),
        }
    }

    #[test]
    fn test_finish_nowait_reports_a_full_transport() {
        let channel: CommandChannel<TestCmd> = CommandChannel::bounded(1);
        channel.sender().send(TestCmd::Echo("x".to_string())).unwrap();

        // The receiver-to-sender direction is already full.
        channel.receiver().send(TestCmd::Pong).unwrap();

        let action = channel.receiver().invoked(ECHO).unwrap().unwrap();
        let sent = action
            .finish_nowait(TestCmd::Echoed("x".to_string()))
            .unwrap();
        assert!(!sent);
    }
}

//! Channel endpoints
//!
//! ## Philosophy
//!
//! - **One queue, one owner.** An actor belongs to exactly one thread. It is
//!   `Send` but deliberately neither `Sync` nor `Clone`, so a transport
//!   direction can never grow a second consumer.
//! - **Arrival order is sacred.** Selective receives park unmatched messages
//!   in a pending buffer and hand them out later in their original order.
//!   Nothing is reordered, duplicated, or silently dropped.
//! - **Failures ride the same rails.** A serving endpoint answers with a
//!   value or a failure under the same response tag; the invoker decides
//!   whether a failure is an error.
//!
//! Blocking calls park the calling thread on the transport. The polling
//! variants (`*_nowait`, [`ChannelActor::received_cmd`],
//! [`ChannelActor::invoked`]) return immediately and suit pump loops that
//! must keep servicing other work.

use crate::action::CommandAction;
use crate::pair::{ActorRole, ChannelId};
use crate::stream::StreamWriter;
use crate::{ChannelError, Command, CommandTag, Message, Payload, TagPair};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::warn;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Outgoing direction of a pair, in either transport mode
pub(crate) enum SendHalf<P> {
    /// In-process FIFO
    Local(Sender<Message<P>>),
    /// Framed byte stream to another process
    Stream(StreamWriter<P>),
}

impl<P> Clone for SendHalf<P> {
    fn clone(&self) -> Self {
        match self {
            SendHalf::Local(tx) => SendHalf::Local(tx.clone()),
            SendHalf::Stream(writer) => SendHalf::Stream(writer.clone()),
        }
    }
}

impl<P: Command> SendHalf<P> {
    pub(crate) fn send(&self, message: Message<P>) -> Result<(), ChannelError> {
        match self {
            SendHalf::Local(tx) => tx.send(message).map_err(|_| ChannelError::Disconnected),
            SendHalf::Stream(writer) => writer.send(&message),
        }
    }

    pub(crate) fn try_send(&self, message: Message<P>) -> Result<bool, ChannelError> {
        match self {
            SendHalf::Local(tx) => match tx.try_send(message) {
                Ok(()) => Ok(true),
                Err(TrySendError::Full(_)) => Ok(false),
                Err(TrySendError::Disconnected(_)) => Err(ChannelError::Disconnected),
            },
            SendHalf::Stream(writer) => writer.try_send(&message),
        }
    }
}

/// Handler invoked by a dispatch pass for one pending request
///
/// The actor is passed back in so a handler can pump nested dispatch passes
/// or send further traffic while it serves the request.
pub type InvocationHandler<P> =
    dyn Fn(&ChannelActor<P>, CommandAction<P>) -> Result<(), ChannelError> + Send + Sync;

struct Registration<P: Command> {
    pair: TagPair,
    handler: Arc<InvocationHandler<P>>,
}

impl<P: Command> Clone for Registration<P> {
    fn clone(&self) -> Self {
        Self {
            pair: self.pair,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// One endpoint of a duplex pair
///
/// Constructed through [`CommandChannel`] for in-process pairs or
/// [`stream_actor`] for cross-process ones; never directly.
///
/// [`CommandChannel`]: crate::CommandChannel
/// [`stream_actor`]: crate::stream_actor
pub struct ChannelActor<P: Command> {
    id: ChannelId,
    role: ActorRole,
    outgoing: SendHalf<P>,
    incoming: Receiver<Message<P>>,
    pending: RefCell<VecDeque<Message<P>>>,
    registry: RefCell<Vec<Registration<P>>>,
}

impl<P: Command> fmt::Debug for ChannelActor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelActor")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl<P: Command> ChannelActor<P> {
    pub(crate) fn from_parts(
        id: ChannelId,
        role: ActorRole,
        outgoing: SendHalf<P>,
        incoming: Receiver<Message<P>>,
    ) -> Self {
        Self {
            id,
            role,
            outgoing,
            incoming,
            pending: RefCell::new(VecDeque::new()),
            registry: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn role(&self) -> ActorRole {
        self.role
    }

    /// Sends a payload under its own tag, blocking while a bounded
    /// transport is full
    pub fn send(&self, payload: P) -> Result<(), ChannelError> {
        self.outgoing.send(Message::value(payload))
    }

    /// Non-blocking [`send`](ChannelActor::send); returns whether the
    /// transport accepted the message
    pub fn send_nowait(&self, payload: P) -> Result<bool, ChannelError> {
        self.outgoing.try_send(Message::value(payload))
    }

    /// Takes the next message in arrival order, blocking until one exists
    ///
    /// Messages parked by earlier selective receives come out first; they
    /// are older than anything still on the transport.
    pub fn receive(&self) -> Result<Message<P>, ChannelError> {
        if let Some(message) = self.pending.borrow_mut().pop_front() {
            return Ok(message);
        }
        self.incoming.recv().map_err(|_| ChannelError::Disconnected)
    }

    /// Non-blocking [`receive`](ChannelActor::receive)
    pub fn receive_nowait(&self) -> Result<Option<Message<P>>, ChannelError> {
        if let Some(message) = self.pending.borrow_mut().pop_front() {
            return Ok(Some(message));
        }
        match self.incoming.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }

    /// Blocks until a message tagged `tag` arrives and returns its payload
    ///
    /// Messages under other tags are parked, not lost, and keep their
    /// relative order for later receives.
    pub fn receive_value(&self, tag: CommandTag) -> Result<Payload<P>, ChannelError> {
        if let Some(message) = self.take_pending(tag) {
            return Ok(message.payload);
        }
        loop {
            let message = self
                .incoming
                .recv()
                .map_err(|_| ChannelError::Disconnected)?;
            if message.tag == tag {
                return Ok(message.payload);
            }
            self.pending.borrow_mut().push_back(message);
        }
    }

    /// [`receive_value`](ChannelActor::receive_value) that converts a
    /// failure payload into an error
    pub fn receive_value_failing(&self, tag: CommandTag) -> Result<P, ChannelError> {
        self.receive_value(tag)?
            .into_result()
            .map_err(ChannelError::from)
    }

    /// Polls for a message tagged `tag`; consumes and discards the match
    ///
    /// Other buffered messages are left untouched. Returns an error once
    /// the peer is gone and nothing buffered can match.
    pub fn received_cmd(&self, tag: CommandTag) -> Result<bool, ChannelError> {
        Ok(self.received_cmd_value(tag)?.is_some())
    }

    /// Polls for a message tagged `tag` and returns its payload if present
    pub fn received_cmd_value(&self, tag: CommandTag) -> Result<Option<Payload<P>>, ChannelError> {
        if let Some(message) = self.take_pending(tag) {
            return Ok(Some(message.payload));
        }
        loop {
            match self.incoming.try_recv() {
                Ok(message) if message.tag == tag => return Ok(Some(message.payload)),
                Ok(message) => self.pending.borrow_mut().push_back(message),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(ChannelError::Disconnected),
            }
        }
    }

    /// Drops every buffered message tagged `tag` and reports how many went
    ///
    /// Used to forget stale responses before starting a fresh exchange. A
    /// dead peer ends the drain instead of failing it; what was purged
    /// stays purged.
    pub fn clear_all(&self, tag: CommandTag) -> Result<usize, ChannelError> {
        let mut cleared = {
            let mut pending = self.pending.borrow_mut();
            let before = pending.len();
            pending.retain(|message| message.tag != tag);
            before - pending.len()
        };
        loop {
            match self.incoming.try_recv() {
                Ok(message) if message.tag == tag => cleared += 1,
                Ok(message) => self.pending.borrow_mut().push_back(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return Ok(cleared)
                }
            }
        }
    }

    /// Sends a request and blocks until the pair's response arrives
    ///
    /// The response may be a value or a failure; the exchange itself only
    /// fails if the transport does.
    pub fn invoke(&self, pair: TagPair, parameter: P) -> Result<Payload<P>, ChannelError> {
        debug_assert_eq!(
            parameter.tag(),
            pair.request,
            "request payload must carry the pair's request tag"
        );
        self.send(parameter)?;
        self.receive_value(pair.response)
    }

    /// [`invoke`](ChannelActor::invoke) that converts a failure response
    /// into an error
    pub fn invoke_failing(&self, pair: TagPair, parameter: P) -> Result<P, ChannelError> {
        self.invoke(pair, parameter)?
            .into_result()
            .map_err(ChannelError::from)
    }

    /// Polls for a pending request under `pair` and hands it out as an
    /// action that must be answered
    pub fn invoked(&self, pair: TagPair) -> Result<Option<CommandAction<P>>, ChannelError> {
        match self.received_cmd_value(pair.request)? {
            Some(Payload::Value(parameter)) => Ok(Some(CommandAction::new(
                self.outgoing.clone(),
                pair,
                parameter,
            ))),
            Some(Payload::Failure(failure)) => {
                warn!(
                    "{} {}: dropping failure frame under request tag {}: {}",
                    self.id, self.role, pair.request, failure
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Registers `handler` for requests under `pair`
    ///
    /// One handler per pair: a second registration for the same pair is
    /// ignored with a warning, so wiring code may run twice without
    /// clobbering live handlers. Handlers share state through interior
    /// mutability if they need any.
    pub fn register<F>(&self, pair: TagPair, handler: F)
    where
        F: Fn(&ChannelActor<P>, CommandAction<P>) -> Result<(), ChannelError>
            + Send
            + Sync
            + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        if registry.iter().any(|existing| existing.pair == pair) {
            warn!(
                "{} {}: handler for {} already registered, keeping the first",
                self.id, self.role, pair
            );
            return;
        }
        registry.push(Registration {
            pair,
            handler: Arc::new(handler),
        });
    }

    /// Removes the handler for `pair`; returns whether one was registered
    pub fn unregister(&self, pair: TagPair) -> bool {
        let mut registry = self.registry.borrow_mut();
        let before = registry.len();
        registry.retain(|registration| registration.pair != pair);
        registry.len() != before
    }

    /// Runs one dispatch pass over the registered handlers
    ///
    /// Each registration is polled once, in registration order, and its
    /// handler runs for at most one pending request. Returns how many
    /// requests this pass handled. The pass works on a snapshot of the
    /// registry, so a handler may pump further passes while it blocks;
    /// requests already consumed by this pass are invisible to them.
    pub fn handle_invocations(&self) -> Result<usize, ChannelError> {
        let snapshot: Vec<Registration<P>> = self.registry.borrow().clone();
        let mut handled = 0;
        for registration in snapshot {
            if let Some(action) = self.invoked(registration.pair)? {
                (registration.handler)(self, action)?;
                handled += 1;
            }
        }
        Ok(handled)
    }

    fn take_pending(&self, tag: CommandTag) -> Option<Message<P>> {
        let mut pending = self.pending.borrow_mut();
        let index = pending.iter().position(|message| message.tag == tag)?;
        pending.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestCmd, ECHO, PING, SUM};
    use crate::CommandChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_send_receive_preserves_fifo_order() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.sender().send(TestCmd::Ping).unwrap();
        channel
            .sender()
            .send(TestCmd::Echo("a".to_string()))
            .unwrap();
        channel.sender().send(TestCmd::Sum(vec![1])).unwrap();

        let receiver = channel.receiver();
        assert_eq!(receiver.receive().unwrap().tag, PING.request);
        assert_eq!(receiver.receive().unwrap().tag, ECHO.request);
        assert_eq!(receiver.receive().unwrap().tag, SUM.request);
        assert_eq!(receiver.receive_nowait().unwrap(), None);
    }

    #[test]
    fn test_receive_value_parks_unmatched_in_order() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.sender().send(TestCmd::Ping).unwrap();
        channel
            .sender()
            .send(TestCmd::Echo("kept".to_string()))
            .unwrap();
        channel.sender().send(TestCmd::Sum(vec![2, 3])).unwrap();

        let receiver = channel.receiver();
        let payload = receiver.receive_value(SUM.request).unwrap();
        assert_eq!(payload.into_result().unwrap(), TestCmd::Sum(vec![2, 3]));

        // The messages skipped over come back first, still in order.
        assert_eq!(receiver.receive().unwrap().tag, PING.request);
        assert_eq!(receiver.receive().unwrap().tag, ECHO.request);
    }

    #[test]
    fn test_received_cmd_value_polls_without_disturbing() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.sender().send(TestCmd::Ping).unwrap();

        let receiver = channel.receiver();
        for _ in 0..3 {
            assert_eq!(receiver.received_cmd_value(SUM.request).unwrap(), None);
        }
        // The mismatching message is neither duplicated nor dropped.
        assert_eq!(receiver.receive().unwrap().tag, PING.request);
        assert_eq!(receiver.receive_nowait().unwrap(), None);
    }

    #[test]
    fn test_received_cmd_consumes_the_match() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.sender().send(TestCmd::Ping).unwrap();
        channel
            .sender()
            .send(TestCmd::Echo("after".to_string()))
            .unwrap();

        let receiver = channel.receiver();
        assert!(receiver.received_cmd(PING.request).unwrap());
        assert!(!receiver.received_cmd(PING.request).unwrap());
        assert_eq!(receiver.receive().unwrap().tag, ECHO.request);
    }

    #[test]
    fn test_clear_all_purges_only_matching() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        let receiver = channel.receiver();
        receiver.send(TestCmd::Echoed("one".to_string())).unwrap();
        receiver.send(TestCmd::Pong).unwrap();
        receiver.send(TestCmd::Echoed("two".to_string())).unwrap();

        let sender = channel.sender();
        assert_eq!(sender.clear_all(ECHO.response).unwrap(), 2);
        assert_eq!(sender.receive().unwrap().tag, PING.response);
        assert_eq!(sender.receive_nowait().unwrap(), None);
    }

    #[test]
    fn test_invoke_round_trip() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        let (near, far) = channel.split();

        let server = thread::spawn(move || {
            let action = loop {
                if let Some(action) = far.invoked(ECHO).unwrap() {
                    break action;
                }
                thread::yield_now();
            };
            let text = match action.parameter() {
                TestCmd::Echo(text) => text.to_uppercase(),
                other => panic!("unexpected request: {:?}", other),
            };
            action.finish(TestCmd::Echoed(text)).unwrap();
        });

        let reply = near.invoke_failing(ECHO, TestCmd::Echo("hi".to_string()));
        assert_eq!(reply.unwrap(), TestCmd::Echoed("HI".to_string()));
        server.join().unwrap();
    }

    #[test]
    fn test_invoke_failing_surfaces_the_failure() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        let (near, far) = channel.split();

        let server = thread::spawn(move || {
            let action = loop {
                if let Some(action) = far.invoked(SUM).unwrap() {
                    break action;
                }
                thread::yield_now();
            };
            action.fail("overflow").unwrap();
        });

        let error = near
            .invoke_failing(SUM, TestCmd::Sum(vec![i64::MAX]))
            .unwrap_err();
        let failure = error.as_failure().expect("command failure");
        assert_eq!(failure.origin, SUM.request);
        assert_eq!(error.to_string(), "command Cmd(2): overflow");
        server.join().unwrap();
    }

    #[test]
    fn test_register_keeps_the_first_handler() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&first);
        channel.receiver().register(ECHO, move |_, action| {
            hits.fetch_add(1, Ordering::SeqCst);
            action.finish(TestCmd::Echoed("first".to_string()))
        });
        let hits = Arc::clone(&second);
        channel.receiver().register(ECHO, move |_, action| {
            hits.fetch_add(1, Ordering::SeqCst);
            action.finish(TestCmd::Echoed("second".to_string()))
        });

        channel
            .sender()
            .send(TestCmd::Echo("x".to_string()))
            .unwrap();
        assert_eq!(channel.receiver().handle_invocations().unwrap(), 1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_stops_dispatch() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel
            .receiver()
            .register(PING, |_, action| action.finish(TestCmd::Pong));

        assert!(channel.receiver().unregister(PING));
        assert!(!channel.receiver().unregister(PING));

        channel.sender().send(TestCmd::Ping).unwrap();
        assert_eq!(channel.receiver().handle_invocations().unwrap(), 0);
        // The request is still there for whoever polls it directly.
        assert!(channel.receiver().received_cmd(PING.request).unwrap());
    }

    #[test]
    fn test_dispatch_pass_handles_one_request_per_pair() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.receiver().register(ECHO, |_, action| {
            let text = match action.parameter() {
                TestCmd::Echo(text) => text.clone(),
                other => panic!("unexpected request: {:?}", other),
            };
            action.finish(TestCmd::Echoed(text))
        });
        channel
            .receiver()
            .register(PING, |_, action| action.finish(TestCmd::Pong));

        channel
            .sender()
            .send(TestCmd::Echo("a".to_string()))
            .unwrap();
        channel
            .sender()
            .send(TestCmd::Echo("b".to_string()))
            .unwrap();
        channel.sender().send(TestCmd::Ping).unwrap();

        assert_eq!(channel.receiver().handle_invocations().unwrap(), 2);
        assert_eq!(channel.receiver().handle_invocations().unwrap(), 1);
        assert_eq!(channel.receiver().handle_invocations().unwrap(), 0);

        let sender = channel.sender();
        assert_eq!(
            sender.receive_value_failing(ECHO.response).unwrap(),
            TestCmd::Echoed("a".to_string())
        );
        assert_eq!(
            sender.receive_value_failing(PING.response).unwrap(),
            TestCmd::Pong
        );
        assert_eq!(
            sender.receive_value_failing(ECHO.response).unwrap(),
            TestCmd::Echoed("b".to_string())
        );
    }

    #[test]
    fn test_nested_dispatch_services_newer_requests() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        channel.receiver().register(ECHO, |actor, action| {
            // Simulates a handler that blocks on a modal surface and pumps
            // the channel while it waits.
            actor.handle_invocations()?;
            action.finish(TestCmd::Echoed("done".to_string()))
        });
        channel
            .receiver()
            .register(PING, |_, action| action.finish(TestCmd::Pong));

        channel
            .sender()
            .send(TestCmd::Echo("outer".to_string()))
            .unwrap();
        channel.sender().send(TestCmd::Ping).unwrap();

        assert_eq!(channel.receiver().handle_invocations().unwrap(), 1);

        // The nested pass answered the ping before the outer echo finished.
        let sender = channel.sender();
        assert_eq!(sender.receive().unwrap().tag, PING.response);
        assert_eq!(sender.receive().unwrap().tag, ECHO.response);
    }

    #[test]
    fn test_disconnect_after_buffered_messages_drain() {
        let channel: CommandChannel<TestCmd> = CommandChannel::unbounded();
        let (near, far) = channel.split();
        far.send(TestCmd::Pong).unwrap();
        drop(far);

        assert_eq!(near.receive().unwrap().tag, PING.response);
        assert_eq!(near.receive().unwrap_err(), ChannelError::Disconnected);
        assert_eq!(
            near.send(TestCmd::Ping).unwrap_err(),
            ChannelError::Disconnected
        );
    }

    #[test]
    fn test_bounded_send_nowait_reports_full() {
        let channel: CommandChannel<TestCmd> = CommandChannel::bounded(1);
        assert!(channel.sender().send_nowait(TestCmd::Ping).unwrap());
        assert!(!channel.sender().send_nowait(TestCmd::Ping).unwrap());

        channel.receiver().receive().unwrap();
        assert!(channel.sender().send_nowait(TestCmd::Ping).unwrap());
    }
}

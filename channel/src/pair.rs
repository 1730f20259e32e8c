//! Pair construction and endpoint identity

use crate::actor::{ChannelActor, SendHalf};
use crate::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a channel pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

/// Which side of a pair an actor holds
///
/// Roles are a naming convention for the common client/server split; both
/// sides of a pair can send and receive either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    Sender,
    Receiver,
}

impl ActorRole {
    pub fn is_sender(&self) -> bool {
        matches!(self, ActorRole::Sender)
    }

    pub fn is_receiver(&self) -> bool {
        matches!(self, ActorRole::Receiver)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Sender => write!(f, "sender"),
            ActorRole::Receiver => write!(f, "receiver"),
        }
    }
}

/// A duplex in-process pair of actors sharing one payload vocabulary
///
/// Both directions use the same transport mode, chosen at construction and
/// fixed for the pair's lifetime. An unbounded pair never blocks a sender;
/// a bounded pair blocks (or refuses, for the `_nowait` variants) when the
/// direction's queue is full.
pub struct CommandChannel<P: Command> {
    id: ChannelId,
    sender: ChannelActor<P>,
    receiver: ChannelActor<P>,
}

impl<P: Command> CommandChannel<P> {
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::build(Some(capacity))
    }

    fn build(capacity: Option<usize>) -> Self {
        let id = ChannelId::new();
        let (to_receiver, from_sender) = Self::direction(capacity);
        let (to_sender, from_receiver) = Self::direction(capacity);
        let sender = ChannelActor::from_parts(
            id,
            ActorRole::Sender,
            SendHalf::Local(to_receiver),
            from_receiver,
        );
        let receiver = ChannelActor::from_parts(
            id,
            ActorRole::Receiver,
            SendHalf::Local(to_sender),
            from_sender,
        );
        Self {
            id,
            sender,
            receiver,
        }
    }

    fn direction(
        capacity: Option<usize>,
    ) -> (
        crossbeam_channel::Sender<crate::Message<P>>,
        crossbeam_channel::Receiver<crate::Message<P>>,
    ) {
        match capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn sender(&self) -> &ChannelActor<P> {
        &self.sender
    }

    pub fn receiver(&self) -> &ChannelActor<P> {
        &self.receiver
    }

    /// Consumes the pair, handing each actor to its owning thread
    pub fn split(self) -> (ChannelActor<P>, ChannelActor<P>) {
        (self.sender, self.receiver)
    }
}

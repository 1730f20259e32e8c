//! # Command Channel
//!
//! Typed duplex message passing between the actors of a studio: UI threads,
//! generation workers, dialog surfaces, file watchers. A channel is a pair
//! of FIFO queues; each endpoint is a [`ChannelActor`] owned by exactly one
//! thread.
//!
//! ## Philosophy
//!
//! - **Closed vocabularies.** Every channel speaks one payload enum whose
//!   variants each carry their [`CommandTag`]; the compiler knows the full
//!   set of commands a pair can exchange.
//! - **Request/response by convention.** A [`TagPair`] names the two tags
//!   of one exchange. [`invoke`] blocks for the response; [`send`] is
//!   fire-and-forget; [`invoked`] and handler dispatch serve the other end.
//! - **No hidden threads for local pairs.** In-process pairs are plain
//!   queues. Only stream pairs, which bridge processes, own a pump thread.
//!
//! [`invoke`]: ChannelActor::invoke
//! [`send`]: ChannelActor::send
//! [`invoked`]: ChannelActor::invoked

pub mod action;
pub mod actor;
pub mod error;
pub mod message;
pub mod pair;
pub mod stream;
pub mod tag;

#[cfg(test)]
pub(crate) mod testing;

pub use action::CommandAction;
pub use actor::{ChannelActor, InvocationHandler};
pub use error::ChannelError;
pub use message::{Command, CommandFailure, Message, Payload};
pub use pair::{ActorRole, ChannelId, CommandChannel};
pub use stream::stream_actor;
pub use tag::{CommandTag, TagPair};

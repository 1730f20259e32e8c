//! Stream-backed pairs for cross-process endpoints
//!
//! A stream endpoint speaks line-delimited JSON frames over any byte stream,
//! in practice a child process's stdio. Reads happen on a dedicated pump
//! thread that decodes frames into an in-process queue, so the actor's
//! non-blocking receives work the same in both pair modes. The pump thread
//! ends at stream EOF or when the actor is dropped.

use crate::actor::{ChannelActor, SendHalf};
use crate::pair::{ActorRole, ChannelId};
use crate::{ChannelError, Command, Message};
use crossbeam_channel::Receiver;
use log::warn;
use std::io::{BufRead, BufReader, Read, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;

/// Shared framed writer for the outgoing direction of a stream pair
pub(crate) struct StreamWriter<P> {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
    _payload: PhantomData<fn(P)>,
}

impl<P> Clone for StreamWriter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _payload: PhantomData,
        }
    }
}

impl<P: Command> StreamWriter<P> {
    pub(crate) fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
            _payload: PhantomData,
        }
    }

    /// Writes one frame, blocking while the OS buffers drain
    pub(crate) fn send(&self, message: &Message<P>) -> Result<(), ChannelError> {
        let mut writer = self.inner.lock().map_err(|_| ChannelError::Disconnected)?;
        write_frame(&mut **writer, message)
    }

    /// Non-blocking variant: a writer already held by another sender counts
    /// as a full transport, and the frame is not written
    pub(crate) fn try_send(&self, message: &Message<P>) -> Result<bool, ChannelError> {
        let mut writer = match self.inner.try_lock() {
            Ok(writer) => writer,
            Err(TryLockError::WouldBlock) => return Ok(false),
            Err(TryLockError::Poisoned(_)) => return Err(ChannelError::Disconnected),
        };
        write_frame(&mut **writer, message)?;
        Ok(true)
    }
}

fn write_frame<P: Command>(
    writer: &mut (impl Write + ?Sized),
    message: &Message<P>,
) -> Result<(), ChannelError> {
    let mut line =
        serde_json::to_string(message).map_err(|err| ChannelError::Codec(err.to_string()))?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|_| ChannelError::Disconnected)
}

/// Spawns the pump thread decoding frames from `reader` into a queue
pub(crate) fn spawn_stream_reader<P, R>(
    reader: R,
    id: ChannelId,
) -> Result<Receiver<Message<P>>, ChannelError>
where
    P: Command,
    R: Read + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name(format!("stream-reader-{}", id.as_uuid()))
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                if line.is_empty() {
                    continue;
                }
                let message: Message<P> = match serde_json::from_str(&line) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("{}: corrupt frame, closing stream: {}", id, err);
                        break;
                    }
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| ChannelError::Spawn(err.to_string()))?;
    Ok(rx)
}

/// Builds one endpoint of a cross-process pair over a byte stream
///
/// Each process constructs its own actor from its halves of the stream; the
/// two actors form the duplex pair. The mode is fixed here, at creation.
pub fn stream_actor<P, R, W>(
    role: ActorRole,
    reader: R,
    writer: W,
) -> Result<ChannelActor<P>, ChannelError>
where
    P: Command,
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let id = ChannelId::new();
    let incoming = spawn_stream_reader(reader, id)?;
    let outgoing = SendHalf::Stream(StreamWriter::new(writer));
    Ok(ChannelActor::from_parts(id, role, outgoing, incoming))
}

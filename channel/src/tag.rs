//! Command tags and tag pairs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one logical request or response kind on a channel
///
/// Tags come from a process-wide namespace and are defined once per
/// logical command, as `const` items next to the payload enum they tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandTag(u32);

impl CommandTag {
    /// Creates a tag from its raw identifier
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cmd({})", self.0)
    }
}

/// The (request, response) tag pair of one logical command
///
/// A pair is immutable and defined once; the request tag identifies the
/// incoming call, the response tag the reply the serving endpoint sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagPair {
    /// Tag carried by the request message
    pub request: CommandTag,
    /// Tag carried by the matching response message
    pub response: CommandTag,
}

impl TagPair {
    /// Creates a tag pair from raw request/response identifiers
    pub const fn new(request: u32, response: u32) -> Self {
        Self {
            request: CommandTag::new(request),
            response: CommandTag::new(response),
        }
    }
}

impl fmt::Display for TagPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cmd({}->{})", self.request.raw(), self.response.raw())
    }
}

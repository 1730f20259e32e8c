//! Command vocabulary used by the unit tests

use crate::{Command, CommandTag, TagPair};
use serde::{Deserialize, Serialize};

pub const ECHO: TagPair = TagPair::new(0, 1);
pub const SUM: TagPair = TagPair::new(2, 3);
pub const PING: TagPair = TagPair::new(4, 5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestCmd {
    Echo(String),
    Echoed(String),
    Sum(Vec<i64>),
    Summed(i64),
    Ping,
    Pong,
}

impl Command for TestCmd {
    fn tag(&self) -> CommandTag {
        match self {
            TestCmd::Echo(_) => ECHO.request,
            TestCmd::Echoed(_) => ECHO.response,
            TestCmd::Sum(_) => SUM.request,
            TestCmd::Summed(_) => SUM.response,
            TestCmd::Ping => PING.request,
            TestCmd::Pong => PING.response,
        }
    }
}

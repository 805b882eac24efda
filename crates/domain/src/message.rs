//! The message type routed by the bus.

use serde::{Deserialize, Serialize};

use crate::product::{Allocate, ChangeBatchQuantity, Command, CreateBatch, Deallocate, Event};

/// Either a command or an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", content = "body")]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    /// Returns the name of the wrapped command or event.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(cmd) => cmd.name(),
            Message::Event(event) => event.kind().name(),
        }
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        Message::Command(cmd)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

macro_rules! command_into_message {
    ($($cmd:ty),* $(,)?) => {
        $(
            impl From<$cmd> for Message {
                fn from(cmd: $cmd) -> Self {
                    Message::Command(cmd.into())
                }
            }
        )*
    };
}

command_into_message!(CreateBatch, Allocate, Deallocate, ChangeBatchQuantity);

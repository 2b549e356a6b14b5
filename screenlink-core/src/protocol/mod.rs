//! The agent's wire protocol: two line-delimited JSON streams.
//!
//! # Outbound (agent → controller)
//! ```text
//! {"type":"screen","data":"<base64 jpeg>"}
//! {"type":"log","message":"<text>"}
//! ```
//!
//! # Inbound (controller → agent)
//! ```text
//! {"type":"SWITCH_MONITOR"}
//! {"type":"SET_MONITOR","index":2}
//! {"type":"MOUSE_CLICK","x":512,"y":288}
//! {"type":"MOUSE_MOVE","x":512,"y":288}
//! {"type":"INPUT_TEXT","text":"…","dialogX":10,"dialogY":20}
//! {"type":"KEY_TAP","key":"enter"}
//! {"type":"TIMED_LOOP_START","x":1,"y":2,"text":"…"}   (MACRO_LOOP_START is identical)
//! {"type":"AUTO_ACCEPT_START"}
//! {"type":"AUTO_ACCEPT_STOP"}
//! {"type":"RESTART_TERMINAL","x":1,"y":2,"command":"npm start"}
//! ```
//!
//! Inbound coordinates are in stream space. Lines that do not parse are
//! dropped; there is no acknowledgement channel in either direction.

pub mod codec;
pub mod io;
pub mod message;

pub use codec::{AgentCodec, MAX_LINE_LENGTH};
pub use io::{Outbox, command_stream, spawn_writer, write_outbound};
pub use message::{Command, LoopRequest, Outbound, parse_command};

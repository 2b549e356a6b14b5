//! # screenlink-agent: stdio screen-control agent
//!
//! Spawned by a controller process. Streams the selected display as JPEG
//! frames on stdout and executes the controller's commands read from
//! stdin. Diagnostics go to stderr.
//!
//! ## Tasks
//!
//! - **Frame producer**: capture, downscale, encode, emit.
//! - **Command dispatcher**: read stdin, inject input, switch monitors.
//! - **Auto-accept**: optional background clicker, started on command.

pub mod config;
pub mod service;

// src/ipc/mod.rs

//! IPC protocol between the manager and its workers.
//!
//! The channel is the worker's stdio: the parent writes one
//! [`SpawnMessage`] line to stdin, the worker answers with
//! [`WorkerMessage`] lines on stdout. Worker stderr is free-form.

pub mod codec;
pub mod message;

pub use codec::{MessageWriter, decode_line, encode_line};
pub use message::{
    ResultsPayload, SpawnMessage, StatsSnapshot, TestRecord, TestStatus, WorkerMessage,
};

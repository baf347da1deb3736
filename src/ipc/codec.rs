// src/ipc/codec.rs

//! Newline-delimited JSON framing.
//!
//! Every message is a single JSON object on its own line. Lines that do not
//! start with `{` are not protocol traffic (a worker printing to stdout) and
//! decode to `None`.

use std::io::Write;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ProtocolError;

/// Encode `msg` as one line, including the trailing newline.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line. `Ok(None)` means the line is not a protocol message.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>, ProtocolError> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| ProtocolError::Decode {
            line: trimmed.to_string(),
            source,
        })
}

/// Blocking writer used on the worker side.
///
/// Each message is flushed immediately so the parent sees it without delay.
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    inner: W,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn send<T: Serialize>(&mut self, msg: &T) -> anyhow::Result<()> {
        let line = encode_line(msg)?;
        self.inner.write_all(line.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

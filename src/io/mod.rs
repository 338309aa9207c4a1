/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Byte-oriented transport capability.
//!
//! The runtime core never talks to a socket directly; everything above this
//! module consumes the [`ByteStream`] capability, which models the
//! non-blocking, peekable transports embedded network stacks expose.  Two
//! implementations ship here: [`TcpByteStream`] for hosted builds and
//! [`MemoryStream`], an in-memory loopback used by tests and demos.

mod memory;

pub use memory::{MemoryHandle, MemoryStream};

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use tracing::{debug, warn};

/// Non-blocking, peekable byte transport.
///
/// `peek`/`read` return `None` when no byte is currently available — never
/// block.  Writes are best-effort: transport failures surface as the
/// connection dropping (`connected()` turning false), not as return values,
/// matching how an always-on device treats its link.
pub trait ByteStream {
    /// Next available byte without consuming it, or `None` if the receive
    /// buffer is currently empty.
    fn peek(&mut self) -> Option<u8>;

    /// Consumes and returns the next available byte.
    fn read(&mut self) -> Option<u8>;

    /// Queues `bytes` for transmission.
    fn write(&mut self, bytes: &[u8]);

    /// Pushes any queued bytes onto the wire.
    fn flush(&mut self);

    /// True while the transport believes the connection is up.
    fn connected(&self) -> bool;

    /// (Re-)establishes the connection, replacing any existing one.
    /// Returns `true` on success.
    fn connect(&mut self, host: &str, port: u16) -> bool;
}

// ── TCP adapter ───────────────────────────────────────────────────────────────

/// [`ByteStream`] over a non-blocking [`TcpStream`].
///
/// A one-byte lookahead buffer provides `peek` on top of the socket's read
/// stream.  Any socket error tears the connection down; the next
/// [`connect`](ByteStream::connect) starts fresh.
#[derive(Debug, Default)]
pub struct TcpByteStream {
    stream: Option<TcpStream>,
    lookahead: Option<u8>,
}

impl TcpByteStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls one byte off the socket into the lookahead buffer.
    fn fill_lookahead(&mut self) {
        if self.lookahead.is_some() {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let mut byte = [0u8; 1];
        match stream.read(&mut byte) {
            Ok(0) => {
                debug!("peer closed the connection");
                self.stream = None;
            }
            Ok(_) => self.lookahead = Some(byte[0]),
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => {
                warn!(%err, "socket read failed; dropping connection");
                self.stream = None;
            }
        }
    }
}

impl ByteStream for TcpByteStream {
    fn peek(&mut self) -> Option<u8> {
        self.fill_lookahead();
        self.lookahead
    }

    fn read(&mut self) -> Option<u8> {
        self.fill_lookahead();
        self.lookahead.take()
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if let Err(err) = stream.write_all(bytes) {
            warn!(%err, "socket write failed; dropping connection");
            self.stream = None;
        }
    }

    fn flush(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if let Err(err) = stream.flush() {
            warn!(%err, "socket flush failed; dropping connection");
            self.stream = None;
        }
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.stream = None;
        self.lookahead = None;

        match TcpStream::connect((host, port)) {
            Ok(stream) => {
                // The poll loops above this layer must never block in read().
                if let Err(err) = stream.set_nonblocking(true) {
                    warn!(%err, "failed to make socket non-blocking");
                    return false;
                }
                let _ = stream.set_nodelay(true);
                debug!(host, port, "connected to master");
                self.stream = Some(stream);
                true
            }
            Err(err) => {
                debug!(host, port, %err, "connect attempt failed");
                false
            }
        }
    }
}

// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Request/response transports for the remote protocol.
//!
//! The wire format is a `u32` little-endian length prefix followed by the
//! bincode body, one frame per message, over a blocking TCP stream. One
//! connection is served at a time; the protocol is strictly synchronous
//! request/response.

use crate::protocol::{decode, encode, Request, Response};
use crate::service::RenderService;
use sdfscope_core::RenderError;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

/// The largest frame either side accepts, a guard against corrupt length
/// prefixes rather than a protocol limit.
const MAX_FRAME: u32 = 256 * 1024 * 1024;

/// A blocking request/response channel to a render service.
pub trait Transport: Send {
    /// Performs one procedure call.
    fn call(&mut self, request: &Request) -> Result<Response, RenderError>;
}

fn io_err(context: &str, err: std::io::Error) -> RenderError {
    RenderError::Transport(format!("{context}: {err}"))
}

/// Writes one length-prefixed frame.
pub fn write_frame(stream: &mut impl Write, body: &[u8]) -> Result<(), RenderError> {
    let len = u32::try_from(body.len())
        .map_err(|_| RenderError::Transport("frame too large".into()))?;
    stream
        .write_all(&len.to_le_bytes())
        .and_then(|()| stream.write_all(body))
        .and_then(|()| stream.flush())
        .map_err(|e| io_err("write frame", e))
}

/// Reads one length-prefixed frame. `Ok(None)` is a clean end of stream.
pub fn read_frame(stream: &mut impl Read) -> Result<Option<Vec<u8>>, RenderError> {
    let mut len_bytes = [0u8; 4];
    match stream.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_err("read frame length", e)),
    }
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME {
        return Err(RenderError::Transport(format!(
            "frame length {len} exceeds limit"
        )));
    }
    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .map_err(|e| io_err("read frame body", e))?;
    Ok(Some(body))
}

/// The TCP client transport.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects to a render service.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, RenderError> {
        let stream = TcpStream::connect(addr).map_err(|e| io_err("connect", e))?;
        stream.set_nodelay(true).map_err(|e| io_err("set nodelay", e))?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn call(&mut self, request: &Request) -> Result<Response, RenderError> {
        write_frame(&mut self.stream, &encode(request)?)?;
        let body = read_frame(&mut self.stream)?
            .ok_or_else(|| RenderError::Transport("connection closed mid-call".into()))?;
        decode(&body)
    }
}

/// An in-process transport wrapping a service directly.
///
/// Messages still pass through the full encode/decode path so the wire
/// representation is exercised without sockets.
pub struct LocalTransport {
    service: RenderService,
}

impl LocalTransport {
    /// Wraps a service.
    pub fn new(service: RenderService) -> Self {
        Self { service }
    }
}

impl Transport for LocalTransport {
    fn call(&mut self, request: &Request) -> Result<Response, RenderError> {
        let wire: Request = decode(&encode(request)?)?;
        let response = self.service.handle(wire);
        decode(&encode(&response)?)
    }
}

/// Serves connections on `listener`, one at a time, until the process
/// exits or the listener fails.
///
/// Per-connection errors are logged and drop only that connection; the
/// next client can reconnect.
pub fn serve(listener: &TcpListener, service: &mut RenderService) -> Result<(), RenderError> {
    loop {
        let (stream, peer) = listener.accept().map_err(|e| io_err("accept", e))?;
        log::info!("client connected: {peer}");
        if let Err(e) = serve_connection(stream, service) {
            log::error!("connection to {peer} failed: {e}");
        } else {
            log::info!("client disconnected: {peer}");
        }
    }
}

fn serve_connection(mut stream: TcpStream, service: &mut RenderService) -> Result<(), RenderError> {
    stream
        .set_nodelay(true)
        .map_err(|e| io_err("set nodelay", e))?;
    while let Some(body) = read_frame(&mut stream)? {
        let request: Request = decode(&body)?;
        let response = service.handle(request);
        write_frame(&mut stream, &encode(&response)?)?;
    }
    Ok(())
}

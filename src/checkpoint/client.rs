//! Checkpoint service client
//!
//! A request/response client over a byte-stream transport. Every call
//! opens a fresh connection and sends exactly one command; restore then
//! reads until the terminator byte has been seen, and closes.
//! No connection reuse, no pooling, and deliberately no timeout: a
//! stalled checkpoint service stalls the triggering request for as long
//! as it stays stalled. Transport failures surface as
//! [`ConnectionBroken`](crate::Error::ConnectionBroken) and are never
//! retried here; retrying is the caller's call.

use crate::checkpoint::wire::{self, Snapshot};
use crate::common::{Error, Result};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_CHUNK: usize = 4096;

pub struct CheckpointClient {
    addr: String,
}

impl CheckpointClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// (Re)initialize the single checkpoint slot.
    pub async fn create_slot(&self) -> Result<()> {
        self.send_command(wire::encode_create()).await
    }

    /// Clear the checkpoint slot.
    pub async fn remove_slot(&self) -> Result<()> {
        self.send_command(wire::encode_remove()).await
    }

    /// Replace the slot with a full group snapshot.
    pub async fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        tracing::debug!(
            "Storing checkpoint for group {} ({} members)",
            snapshot.name,
            snapshot.members.len()
        );
        self.send_command(wire::encode_store(snapshot)).await
    }

    /// Fetch the current snapshot, if any is stored.
    pub async fn fetch_snapshot(&self) -> Result<Option<Snapshot>> {
        let mut stream = self.connect().await?;
        send_all(&mut stream, wire::encode_restore().as_bytes()).await?;
        let payload = read_message(&mut stream).await?;
        wire::decode_snapshot(&payload)
    }

    async fn send_command(&self, msg: String) -> Result<()> {
        let mut stream = self.connect().await?;
        send_all(&mut stream, msg.as_bytes()).await
    }

    async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::ConnectionBroken(format!("connect {}: {}", self.addr, e)))
    }
}

/// A single write may transfer fewer bytes than requested; loop,
/// accumulating what was actually written, until the payload is flushed.
/// A zero-byte write means the peer is gone.
async fn send_all(stream: &mut TcpStream, payload: &[u8]) -> Result<()> {
    let mut sent = 0;
    while sent < payload.len() {
        let n = stream
            .write(&payload[sent..])
            .await
            .map_err(|e| Error::ConnectionBroken(format!("send: {}", e)))?;
        if n == 0 {
            return Err(Error::ConnectionBroken("zero-byte write".into()));
        }
        sent += n;
    }
    stream
        .flush()
        .await
        .map_err(|e| Error::ConnectionBroken(format!("flush: {}", e)))
}

/// Read until the terminator byte appears anywhere in the accumulated
/// input; everything read so far is one complete message.
async fn read_message(stream: &mut TcpStream) -> Result<String> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    while !buf.contains(&wire::TERMINATOR_BYTE) {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::ConnectionBroken(format!("recv: {}", e)))?;
        if n == 0 {
            return Err(Error::ConnectionBroken(
                "end of stream before terminator".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8(buf.to_vec())
        .map_err(|_| Error::MalformedSnapshot("restore payload is not UTF-8".into()))
}

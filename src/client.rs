//! Per-connection endpoint.
//!
//! Grounded on `handlers/client.rs`'s reader/writer task split (`mpsc`
//! outbound channel, `io::split`, buffered reads). Decode/parse failures are
//! not turned into replies here (the endpoint has no view of the client's
//! current nick/registration state) — they are forwarded to the hub as part
//! of the `MESSAGE` event and converted at the hub's single error-conversion
//! point instead.
//!
//! Generic over `AsyncRead + AsyncWrite` rather than `TcpStream` so it can
//! be driven in tests by an in-memory `tokio::io::duplex` pair.

use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::errors::IrcError;
use crate::hub::{ClientId, Event, HubSender};
use crate::message::{self, Message};

const READ_CHUNK: usize = 4096;
const OUTBOUND_CHANNEL_SIZE: usize = 32;
const MAX_LINE_LENGTH: usize = 512;

/// Drives one connection end to end: registers with the hub, spawns the
/// write path, and reads inbound lines until the peer disconnects, the hub
/// requests a close (e.g. after `QUIT`), or the write path fails first.
pub async fn run<S>(socket: S, addr: SocketAddr, hub: HubSender, max_line_length: usize)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = io::split(socket);
    let (tx_outbound, rx_outbound) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_SIZE);
    let (tx_close, rx_close) = oneshot::channel::<()>();
    let (tx_id, rx_id) = oneshot::channel::<ClientId>();

    let registered = hub
        .send(Event::NewClient {
            addr,
            outbound: tx_outbound,
            close_tx: tx_close,
            reply: tx_id,
        })
        .await
        .is_ok();
    if !registered {
        warn!("hub queue closed before {addr} could register");
        return;
    }

    let Ok(client_id) = rx_id.await else {
        warn!("hub dropped {addr} before assigning a client id");
        return;
    };
    info!("client connected: {addr} ({client_id:?})");

    let mut writer_task = tokio::spawn(write_loop(writer, rx_outbound));

    // Three ways this connection can end: the peer stops sending, the hub
    // tells us to close (QUIT), or the write side dies first (a broken pipe
    // on a half-open socket). Any one of them tears down the other side too,
    // so exactly one LOST_CLIENT is published below regardless of which end
    // failed.
    tokio::select! {
        _ = read_loop(reader, client_id, hub.clone(), max_line_length) => {}
        _ = rx_close => {
            debug!("{client_id:?} closed by the hub");
        }
        _ = &mut writer_task => {
            debug!("{client_id:?} write path closed first; tearing down the read side too");
        }
    }

    let _ = hub.send(Event::LostClient(client_id)).await;
    writer_task.abort();
}

/// Reads chunks off the socket, converts CR to LF, and emits each
/// LF-terminated, whitespace-trimmed segment as a `MESSAGE` event. Empty
/// segments are dropped silently. Segments longer than `max_line_length` are
/// truncated rather than rejected outright, cutting at the last trailing-
/// parameter boundary within the limit where one exists so the retained
/// prefix still parses cleanly instead of ending mid-trailing-parameter.
async fn read_loop<R>(mut reader: R, client_id: ClientId, hub: HubSender, max_line_length: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("{client_id:?} reached EOF");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                debug!("{client_id:?} read error: {err}");
                return;
            }
        };

        pending.extend(buf[..n].iter().map(|&b| if b == b'\r' { b'\n' } else { b }));

        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let segment: Vec<u8> = pending.drain(..=pos).collect();
            let trimmed = trim_ascii_whitespace(&segment[..segment.len() - 1]);
            if trimmed.is_empty() {
                continue;
            }
            let trimmed = truncate_to_limit(trimmed, max_line_length);

            let parsed = decode_and_parse(trimmed);
            if hub.send(Event::Message(client_id, parsed)).await.is_err() {
                return;
            }
        }
    }
}

fn decode_and_parse(line: &[u8]) -> Result<Message, IrcError> {
    let text = std::str::from_utf8(line).map_err(|_| IrcError::IncorrectEncoding)?;
    message::parse(text).map_err(|_| IrcError::Malformed)
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    if start >= end { &[] } else { &bytes[start..end] }
}

/// Cuts an over-long line down to `max_len` bytes. Prefers cutting right
/// before the last `" :"` trailing-parameter marker within the limit, so a
/// long message text is dropped cleanly instead of handed to the parser
/// half-formed; falls back to a hard cut backed off to a UTF-8 character
/// boundary when no such marker exists within the limit.
fn truncate_to_limit(line: &[u8], max_len: usize) -> &[u8] {
    if line.len() <= max_len {
        return line;
    }
    let limit = &line[..max_len];
    if let Some(pos) = limit.windows(2).rposition(|w| w == b" :") {
        return &line[..pos];
    }
    let mut end = max_len;
    while end > 0 && (line[end] & 0b1100_0000) == 0b1000_0000 {
        end -= 1;
    }
    &line[..end]
}

/// Serialises and writes whatever the hub schedules for this client. At
/// most one write is ever in flight; write errors are non-fatal here and
/// simply end the loop, which the caller treats as a disconnect that also
/// needs to tear down the read side.
async fn write_loop<W>(mut writer: W, mut rx_outbound: mpsc::Receiver<Message>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx_outbound.recv().await {
        let line = message::serialise_message(&message);
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            debug!("write error, closing connection: {err}");
            return;
        }
    }
}

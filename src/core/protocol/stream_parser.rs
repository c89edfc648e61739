// src/core/protocol/stream_parser.rs

//! The resumable, client-facing RESP stream parser.
//!
//! `parse_stream` spawns a dedicated worker per connection that reads bytes,
//! drives a small state machine and publishes one payload per decoded frame.
//! A protocol error publishes an error payload, resets the state and resumes
//! reading, so a client can recover by sending a well-formed command. The
//! channel is closed only on unrecoverable I/O (EOF, reset, closed socket).

use super::resp_frame::{CRLF_LEN, MAX_BULK_STRING_SIZE, MAX_FRAME_ELEMENTS};
use super::RespFrame;
use crate::core::PyropeError;
use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// One parse result published to the connection handler: either a decoded
/// frame or a recoverable protocol error.
pub type Payload = Result<RespFrame, PyropeError>;

/// Per-connection parser state. The parse is complete iff
/// `expected_args_count > 0 && args.len() == expected_args_count`.
#[derive(Debug, Default)]
struct ParseState {
    reading_multi_line: bool,
    expected_args_count: usize,
    msg_type: u8,
    args: Vec<Bytes>,
    /// Length of the next bulk payload to read verbatim; 0 means line mode.
    bulk_len: usize,
}

impl ParseState {
    fn finished(&self) -> bool {
        self.expected_args_count > 0 && self.args.len() == self.expected_args_count
    }

    fn reset(&mut self) {
        *self = ParseState::default();
    }
}

/// One logical line handed to the state machine.
enum Line {
    /// A CRLF-terminated header line, CRLF stripped. Its first byte is a
    /// RESP type tag and is inspected by the state machine.
    Header(Vec<u8>),
    /// A verbatim bulk payload of the previously announced length, CRLF
    /// stripped. Never inspected, so payloads beginning with `$` or
    /// containing `\r\n` survive untouched.
    Body(Bytes),
}

/// Spawns the parse worker for `reader` and returns the payload channel.
pub fn parse_stream<R>(reader: R) -> mpsc::Receiver<Payload>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        // A panicking worker must not take the process down; the channel is
        // simply closed and the handler cleans up the connection.
        if let Err(panic) = AssertUnwindSafe(parse_loop(reader, tx)).catch_unwind().await {
            error!("RESP parse worker panicked: {:?}", panic);
        }
    });
    rx
}

async fn parse_loop<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<Payload>) {
    let mut reader = BufReader::new(reader);
    let mut state = ParseState::default();

    loop {
        let line = if state.bulk_len == 0 {
            // Line mode: read up to and including the next `\n` and require
            // the preceding byte to be `\r`.
            let mut buf = Vec::new();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("connection stream ended");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("read error on connection stream: {}", e);
                    return;
                }
            }
            if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
                let detail = String::from_utf8_lossy(buf.trim_ascii_end()).to_string();
                state.reset();
                if tx.send(Err(PyropeError::ProtocolError(detail))).await.is_err() {
                    return;
                }
                continue;
            }
            buf.truncate(buf.len() - CRLF_LEN);
            Line::Header(buf)
        } else {
            // Bulk mode: read exactly `bulk_len + 2` bytes verbatim. `\r\n`
            // inside the payload is part of the value.
            let mut buf = vec![0u8; state.bulk_len + CRLF_LEN];
            if let Err(e) = reader.read_exact(&mut buf).await {
                debug!("read error inside bulk payload: {}", e);
                return;
            }
            state.bulk_len = 0;
            if &buf[buf.len() - CRLF_LEN..] != b"\r\n" {
                state.reset();
                let err = PyropeError::ProtocolError("invalid bulk terminator".into());
                if tx.send(Err(err)).await.is_err() {
                    return;
                }
                continue;
            }
            buf.truncate(buf.len() - CRLF_LEN);
            Line::Body(Bytes::from(buf))
        };

        let step = if state.reading_multi_line {
            read_body(&mut state, line)
        } else {
            read_header(&mut state, line)
        };

        match step {
            Ok(Some(frame)) => {
                state.reset();
                if tx.send(Ok(frame)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                state.reset();
                if tx.send(Err(e)).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Handles the first line of a frame while the parser is idle.
fn read_header(state: &mut ParseState, line: Line) -> Result<Option<RespFrame>, PyropeError> {
    let Line::Header(line) = line else {
        // bulk_len is only ever non-zero in multi mode.
        unreachable!("verbatim body line outside multi mode");
    };
    let Some(&tag) = line.first() else {
        return Err(PyropeError::ProtocolError("empty line".into()));
    };
    let rest = &line[1..];

    match tag {
        b'*' => {
            let count = parse_decimal(rest, &line)?;
            if count == 0 {
                return Ok(Some(RespFrame::Array(Vec::new())));
            }
            if count < 0 || count as usize > MAX_FRAME_ELEMENTS {
                return Err(illegal_number(&line));
            }
            state.reading_multi_line = true;
            state.msg_type = b'*';
            state.expected_args_count = count as usize;
            state.args = Vec::with_capacity(count as usize);
            Ok(None)
        }
        b'$' => {
            let len = parse_decimal(rest, &line)?;
            if len == -1 {
                return Ok(Some(RespFrame::Null));
            }
            if len < 0 || len as usize > MAX_BULK_STRING_SIZE {
                return Err(illegal_number(&line));
            }
            state.reading_multi_line = true;
            state.msg_type = b'$';
            state.expected_args_count = 1;
            state.args = Vec::with_capacity(1);
            state.bulk_len = len as usize;
            Ok(None)
        }
        b'+' => Ok(Some(RespFrame::SimpleString(
            String::from_utf8_lossy(rest).to_string(),
        ))),
        b'-' => Ok(Some(RespFrame::Error(
            String::from_utf8_lossy(rest).to_string(),
        ))),
        b':' => {
            let n = parse_decimal(rest, &line)?;
            Ok(Some(RespFrame::Integer(n)))
        }
        _ => Err(PyropeError::ProtocolError(
            String::from_utf8_lossy(&line).to_string(),
        )),
    }
}

/// Handles a body line while assembling a multi-line frame.
fn read_body(state: &mut ParseState, line: Line) -> Result<Option<RespFrame>, PyropeError> {
    match line {
        // A verbatim payload is appended without inspection.
        Line::Body(payload) => state.args.push(payload),
        Line::Header(line) => {
            if line.first() == Some(&b'$') {
                // A bulk header announces the length of the next verbatim read.
                // `$0` leaves bulk_len at zero; the following empty line then
                // produces an empty byte string.
                let len = parse_decimal(&line[1..], &line)?;
                if len < 0 || len as usize > MAX_BULK_STRING_SIZE {
                    return Err(illegal_number(&line));
                }
                state.bulk_len = len as usize;
            } else {
                state.args.push(Bytes::from(line));
            }
        }
    }

    if !state.finished() {
        return Ok(None);
    }
    let args = std::mem::take(&mut state.args);
    let frame = match state.msg_type {
        b'*' => RespFrame::Array(args.into_iter().map(RespFrame::BulkString).collect()),
        _ => RespFrame::BulkString(args.into_iter().next().unwrap_or_default()),
    };
    Ok(Some(frame))
}

fn parse_decimal(digits: &[u8], line: &[u8]) -> Result<i64, PyropeError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| illegal_number(line))
}

fn illegal_number(line: &[u8]) -> PyropeError {
    PyropeError::ProtocolError(format!("illegal number {}", String::from_utf8_lossy(line)))
}

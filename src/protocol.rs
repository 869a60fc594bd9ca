//! Status protocol between a runner (child) and the spawner (parent).
//!
//! A runner reports exactly one outcome per test as newline-terminated decimal integers, optionally followed by a
//! length-prefixed message:
//!
//! ```text
//! <result>
//! <stage>
//! <signal>
//! <message length>      only when result != RESULT_NO_ERROR
//! <message bytes>       exactly <message length> bytes, no trailing delimiter
//! ```
//!
//! Messages longer than [`MAX_MESSAGE_LEN`] bytes are truncated by the sender, and a receiver told a longer length
//! reads only [`MAX_MESSAGE_LEN`] bytes. Both sides warn when that happens but carry on.

use std::borrow::Cow;
use std::io::{self, BufRead, Write};

use forkcase_core::{ResultKind, Stage};
use thiserror::Error;

/// Largest message payload carried by one status report, in bytes.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Errors while decoding a status report.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("status stream closed before any status was written")]
    Empty,

    #[error("status stream closed while reading the {field}")]
    Truncated { field: &'static str },

    #[error("malformed {field} field: {line:?}")]
    Malformed { field: &'static str, line: String },

    #[error("unknown {field} code {code}")]
    UnknownCode { field: &'static str, code: i64 },

    #[error("I/O error on status stream: {0}")]
    Io(#[from] io::Error),
}

/// One test outcome as reported over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub result: ResultKind,
    pub stage: Stage,
    pub signal: i32,
    /// Raw message bytes; empty (and not transmitted) for [`ResultKind::NoError`].
    pub message: Vec<u8>,
}

impl StatusMessage {
    /// The report of a run that reached [`Stage::Completed`].
    pub fn completed() -> Self {
        Self {
            result: ResultKind::NoError,
            stage: Stage::Completed,
            signal: 0,
            message: Vec::new(),
        }
    }

    pub fn failure(result: ResultKind, stage: Stage, signal: i32, message: impl Into<Vec<u8>>) -> Self {
        Self {
            result,
            stage,
            signal,
            message: message.into(),
        }
    }

    /// Message decoded as UTF-8, with invalid sequences replaced.
    pub fn message_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }
}

/// Encode `status` into its wire form, truncating an oversized message.
pub fn encode(status: &StatusMessage) -> Vec<u8> {
    let mut out = format!(
        "{}\n{}\n{}\n",
        status.result.code(),
        status.stage.code(),
        status.signal
    )
    .into_bytes();

    if status.result != ResultKind::NoError {
        let mut message = status.message.as_slice();
        if message.len() > MAX_MESSAGE_LEN {
            tracing::warn!(
                len = message.len(),
                "status message exceeds {MAX_MESSAGE_LEN} bytes; sending the first {MAX_MESSAGE_LEN}"
            );
            message = &message[..MAX_MESSAGE_LEN];
        }
        out.extend_from_slice(format!("{}\n", message.len()).as_bytes());
        out.extend_from_slice(message);
    }
    out
}

/// Write `status` and flush, so a blocked reader sees the whole report.
pub fn write_status<W: Write + ?Sized>(out: &mut W, status: &StatusMessage) -> io::Result<()> {
    out.write_all(&encode(status))?;
    out.flush()
}

/// Read one status report.
///
/// ## Errors
/// - [`ProtocolError::Empty`] if the stream ends before the first field; the writer never reported.
/// - [`ProtocolError::Truncated`] if it ends part-way through a report.
/// - [`ProtocolError::Malformed`] / [`ProtocolError::UnknownCode`] for fields that are not valid integers or codes.
pub fn read_status<R: BufRead + ?Sized>(input: &mut R) -> Result<StatusMessage, ProtocolError> {
    let Some(result_code) = read_int(input, "result")? else {
        return Err(ProtocolError::Empty);
    };
    let result = u8::try_from(result_code)
        .ok()
        .and_then(ResultKind::from_code)
        .ok_or(ProtocolError::UnknownCode {
            field: "result",
            code: result_code,
        })?;

    let stage_code = require_int(input, "stage")?;
    let stage = u8::try_from(stage_code)
        .ok()
        .and_then(Stage::from_code)
        .ok_or(ProtocolError::UnknownCode {
            field: "stage",
            code: stage_code,
        })?;

    let signal_code = require_int(input, "signal")?;
    let signal = i32::try_from(signal_code).map_err(|_| ProtocolError::UnknownCode {
        field: "signal",
        code: signal_code,
    })?;

    if result == ResultKind::NoError {
        return Ok(StatusMessage::failure(result, stage, signal, Vec::new()));
    }

    let announced = require_int(input, "message length")?;
    let announced = usize::try_from(announced).map_err(|_| ProtocolError::Malformed {
        field: "message length",
        line: announced.to_string(),
    })?;
    if announced > MAX_MESSAGE_LEN {
        tracing::warn!(
            len = announced,
            "announced status message exceeds {MAX_MESSAGE_LEN} bytes; reading the first {MAX_MESSAGE_LEN}"
        );
    }

    let mut message = vec![0u8; announced.min(MAX_MESSAGE_LEN)];
    input.read_exact(&mut message).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ProtocolError::Truncated { field: "message" },
        _ => ProtocolError::Io(e),
    })?;

    Ok(StatusMessage::failure(result, stage, signal, message))
}

fn read_int<R: BufRead + ?Sized>(input: &mut R, field: &'static str) -> Result<Option<i64>, ProtocolError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    trimmed.parse::<i64>().map(Some).map_err(|_| ProtocolError::Malformed {
        field,
        line: trimmed.to_string(),
    })
}

fn require_int<R: BufRead + ?Sized>(input: &mut R, field: &'static str) -> Result<i64, ProtocolError> {
    read_int(input, field)?.ok_or(ProtocolError::Truncated { field })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> Result<StatusMessage, ProtocolError> {
        read_status(&mut Cursor::new(bytes))
    }

    #[test]
    fn test_completed_wire_form() {
        let bytes = encode(&StatusMessage::completed());
        assert_eq!(bytes, b"0\n6\n0\n");
        assert_eq!(decode(&bytes).unwrap(), StatusMessage::completed());
    }

    #[test]
    fn test_failure_wire_form() {
        let status = StatusMessage::failure(ResultKind::CaughtSignal, Stage::Shutdown, 8, "boom");
        let bytes = encode(&status);
        assert_eq!(bytes, b"1\n5\n8\n4\nboom");
        assert_eq!(decode(&bytes).unwrap(), status);
    }

    #[test]
    fn test_message_with_newlines_survives() {
        let status = StatusMessage::failure(
            ResultKind::UncaughtException,
            Stage::TestBody,
            0,
            "line one\nline two\n",
        );
        let decoded = decode(&encode(&status)).unwrap();
        assert_eq!(decoded.message_text(), "line one\nline two\n");
    }

    #[test]
    fn test_no_error_message_is_not_sent() {
        let status = StatusMessage::failure(ResultKind::NoError, Stage::Completed, 0, "ignored");
        assert_eq!(encode(&status), b"0\n6\n0\n");
    }

    #[test]
    fn test_oversized_message_truncated_on_send() {
        let status = StatusMessage::failure(
            ResultKind::UncaughtException,
            Stage::TestBody,
            0,
            vec![b'x'; MAX_MESSAGE_LEN + 100],
        );
        let decoded = decode(&encode(&status)).unwrap();
        assert_eq!(decoded.message.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_oversized_length_truncated_on_receive() {
        let mut bytes = b"2\n3\n0\n5000\n".to_vec();
        bytes.extend(vec![b'y'; 5000]);
        let mut cursor = Cursor::new(bytes);
        let decoded = read_status(&mut cursor).unwrap();
        assert_eq!(decoded.message.len(), MAX_MESSAGE_LEN);
        assert_eq!(cursor.position() as usize, b"2\n3\n0\n5000\n".len() + MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_empty_stream() {
        assert!(matches!(decode(b""), Err(ProtocolError::Empty)));
    }

    #[test]
    fn test_truncated_streams() {
        assert!(matches!(
            decode(b"1\n3\n"),
            Err(ProtocolError::Truncated { field: "signal" })
        ));
        assert!(matches!(
            decode(b"1\n3\n11\n"),
            Err(ProtocolError::Truncated { field: "message length" })
        ));
        assert!(matches!(
            decode(b"1\n3\n11\n10\nshort"),
            Err(ProtocolError::Truncated { field: "message" })
        ));
    }

    #[test]
    fn test_malformed_fields() {
        assert!(matches!(
            decode(b"one\n"),
            Err(ProtocolError::Malformed { field: "result", .. })
        ));
        assert!(matches!(
            decode(b"9\n0\n0\n"),
            Err(ProtocolError::UnknownCode { field: "result", code: 9 })
        ));
        assert!(matches!(
            decode(b"1\n42\n0\n"),
            Err(ProtocolError::UnknownCode { field: "stage", code: 42 })
        ));
        assert!(matches!(
            decode(b"2\n3\n0\n-4\n"),
            Err(ProtocolError::Malformed { field: "message length", .. })
        ));
    }

    #[test]
    fn test_crlf_tolerated() {
        let decoded = decode(b"2\r\n3\r\n0\r\n2\r\nok").unwrap();
        assert_eq!(decoded.result, ResultKind::UncaughtException);
        assert_eq!(decoded.message, b"ok");
    }
}

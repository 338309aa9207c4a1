/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! DCP response streaming parser.
//!
//! The transport is non-blocking, so the response is decoded byte by byte as
//! data trickles in.  Every empty poll burns one unit of a single stall
//! budget shared across the whole response ([`MAX_ATTEMPTS`] waits of
//! [`POLL_DELAY_MS`]), ceding the CPU through [`Scheduler::sleep`] between
//! polls.  On builds without sleeping the parser fails fast instead of
//! spinning.
//!
//! Error handling is all-or-nothing: a malformed byte or an exhausted stall
//! budget yields a record with *every* field cleared and a synthesized
//! status ([`DcpStatus::InvalidResponse`] / [`DcpStatus::ResponseTimeout`]).
//! Partially-populated records are never observable.

use tracing::warn;

use crate::io::ByteStream;
use crate::sched::Scheduler;

use super::{
    DcpStatus, DEVICE_ID_MAX_LEN, MAX_ATTEMPTS, NUMERIC_MAX_DIGITS, POLL_DELAY_MS,
    SESSION_ID_MAX_LEN, SUBDEVICE_ID_MAX_LEN,
};

/// One parsed DCP response.
///
/// Inspect [`status`](Self::status) before trusting anything else: timeout
/// and invalid records carry cleared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcpResponse {
    pub device_id: String,
    pub sub_device_id: String,
    pub session_id: String,
    pub session_timestamp: u32,
    pub status: DcpStatus,
    pub content_length: u32,
    pub body: String,
}

/// Terminal failure of a response parse.
enum ParseAbort {
    /// The shared stall budget ran out (or sleeping is unavailable).
    Timeout,
    /// A field was malformed: wrong terminator, bad digit, overflow,
    /// unknown status, oversized or non-text body.
    Invalid,
}

impl DcpResponse {
    /// Decodes one response frame from `stream`, ceding the CPU through
    /// `sched` while waiting for bytes.  `max_body_len` caps the body
    /// allocation; responses declaring more are invalid.
    ///
    /// Never fails outright: budget exhaustion and malformed frames come
    /// back as cleared records with the corresponding synthesized status.
    pub fn receive(
        stream: &mut dyn ByteStream,
        sched: &mut Scheduler,
        max_body_len: usize,
    ) -> DcpResponse {
        let mut parser = Parser {
            stream,
            sched,
            attempts: 0,
        };

        match parser.parse(max_body_len) {
            Ok(response) => response,
            Err(ParseAbort::Timeout) => {
                warn!("response stall budget exhausted");
                Self::cleared(DcpStatus::ResponseTimeout)
            }
            Err(ParseAbort::Invalid) => {
                warn!("malformed response from master");
                Self::cleared(DcpStatus::InvalidResponse)
            }
        }
    }

    /// Record with every field cleared and the given synthesized status.
    fn cleared(status: DcpStatus) -> DcpResponse {
        DcpResponse {
            device_id: String::new(),
            sub_device_id: String::new(),
            session_id: String::new(),
            session_timestamp: 0,
            status,
            content_length: 0,
            body: String::new(),
        }
    }

    /// Serializes the record back into its wire frame.
    ///
    /// The inverse of [`receive`](Self::receive) for well-formed records.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 64);

        out.extend_from_slice(self.device_id.as_bytes());
        if !self.sub_device_id.is_empty() {
            out.push(b':');
            out.extend_from_slice(self.sub_device_id.as_bytes());
        }
        out.push(b'\n');

        out.extend_from_slice(self.session_id.as_bytes());
        out.push(b':');
        out.extend_from_slice(self.session_timestamp.to_string().as_bytes());
        out.push(b'\n');

        out.extend_from_slice(format!("{:02}", self.status.code()).as_bytes());
        out.push(b'\n');

        if self.status.has_body() {
            out.extend_from_slice(self.content_length.to_string().as_bytes());
            out.push(b'\n');
            out.extend_from_slice(self.body.as_bytes());
        }

        out
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser<'a> {
    stream: &'a mut dyn ByteStream,
    sched: &'a mut Scheduler,
    attempts: u32,
}

impl Parser<'_> {
    fn parse(&mut self, max_body_len: usize) -> Result<DcpResponse, ParseAbort> {
        let device_id = self.parse_device_id()?;
        let sub_device_id = self.parse_sub_device_id()?;
        let session_id = self.parse_session_id()?;
        let session_timestamp = self.parse_decimal()?;
        let status = self.parse_status()?;

        let (content_length, body) = if status.has_body() {
            let declared = self.parse_decimal()?;
            if declared as usize > max_body_len {
                return Err(ParseAbort::Invalid);
            }
            if declared > 0 {
                (declared, self.parse_body(declared as usize)?)
            } else {
                (0, String::new())
            }
        } else {
            (0, String::new())
        };

        Ok(DcpResponse {
            device_id,
            sub_device_id,
            session_id,
            session_timestamp,
            status,
            content_length,
            body,
        })
    }

    /// Waits until the stream has a byte and returns it without consuming
    /// it.  Each empty poll burns one unit of the shared stall budget and
    /// cedes the CPU for [`POLL_DELAY_MS`].
    fn wait_for_byte(&mut self) -> Result<u8, ParseAbort> {
        loop {
            if let Some(byte) = self.stream.peek() {
                return Ok(byte);
            }
            if self.attempts >= MAX_ATTEMPTS {
                return Err(ParseAbort::Timeout);
            }
            self.attempts += 1;

            // Without sleep support there is no sane way to pace the wait;
            // fail fast rather than spin the CPU dry.
            if self.sched.sleep(POLL_DELAY_MS).is_err() {
                return Err(ParseAbort::Timeout);
            }
        }
    }

    /// Waits for, consumes, and returns the next byte.
    fn next_byte(&mut self) -> Result<u8, ParseAbort> {
        let byte = self.wait_for_byte()?;
        self.stream.read();
        Ok(byte)
    }

    /// Device ID: up to 16 bytes, ended by `:` (sub-device follows) or
    /// `\n` (sub-device omitted).  Only the `:` is consumed here; the
    /// newline is left for the sub-device parse.
    fn parse_device_id(&mut self) -> Result<String, ParseAbort> {
        let mut field = Vec::new();

        while field.len() < DEVICE_ID_MAX_LEN {
            let byte = self.wait_for_byte()?;
            if byte == b':' || byte == b'\n' {
                break;
            }
            self.stream.read();
            field.push(byte);
        }

        if self.wait_for_byte()? == b':' {
            self.stream.read();
        }

        String::from_utf8(field).map_err(|_| ParseAbort::Invalid)
    }

    /// Sub-device ID: up to 8 bytes, ended by `\n`.  Empty when the device
    /// line had no `:` section.
    fn parse_sub_device_id(&mut self) -> Result<String, ParseAbort> {
        let mut field = Vec::new();

        while field.len() < SUBDEVICE_ID_MAX_LEN {
            if self.wait_for_byte()? == b'\n' {
                break;
            }
            let byte = self.next_byte()?;
            field.push(byte);
        }

        if self.next_byte()? != b'\n' {
            return Err(ParseAbort::Invalid);
        }

        String::from_utf8(field).map_err(|_| ParseAbort::Invalid)
    }

    /// Session ID: up to 32 bytes, ended by `:`.
    fn parse_session_id(&mut self) -> Result<String, ParseAbort> {
        let mut field = Vec::new();

        while field.len() < SESSION_ID_MAX_LEN {
            if self.wait_for_byte()? == b':' {
                break;
            }
            let byte = self.next_byte()?;
            field.push(byte);
        }

        if self.next_byte()? != b':' {
            return Err(ParseAbort::Invalid);
        }

        String::from_utf8(field).map_err(|_| ParseAbort::Invalid)
    }

    /// Newline-terminated decimal field of at most [`NUMERIC_MAX_DIGITS`]
    /// digits.  Overflow past `u32` is malformed, not truncated.
    fn parse_decimal(&mut self) -> Result<u32, ParseAbort> {
        let mut value: u32 = 0;
        let mut digits = 0;

        while digits < NUMERIC_MAX_DIGITS {
            if self.wait_for_byte()? == b'\n' {
                break;
            }
            let byte = self.next_byte()?;
            if !byte.is_ascii_digit() {
                return Err(ParseAbort::Invalid);
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(byte - b'0')))
                .ok_or(ParseAbort::Invalid)?;
            digits += 1;
        }

        if self.next_byte()? != b'\n' {
            return Err(ParseAbort::Invalid);
        }

        Ok(value)
    }

    /// Status line: exactly two ASCII digits, tens then units, ended by
    /// `\n`.  The tens digit must be in `[0, 5]` and the resulting value
    /// must be an assigned [`DcpStatus`] code.
    fn parse_status(&mut self) -> Result<DcpStatus, ParseAbort> {
        let tens = self.next_byte()?;
        if !tens.is_ascii_digit() || tens > b'5' {
            return Err(ParseAbort::Invalid);
        }

        let units = self.next_byte()?;
        if !units.is_ascii_digit() {
            return Err(ParseAbort::Invalid);
        }

        let code = (tens - b'0') * 10 + (units - b'0');
        let status = DcpStatus::from_code(code).ok_or(ParseAbort::Invalid)?;

        if self.next_byte()? != b'\n' {
            return Err(ParseAbort::Invalid);
        }

        Ok(status)
    }

    /// Exactly `len` body bytes.  Bodies are text in this protocol; bytes
    /// that are not valid UTF-8 make the whole response invalid.
    fn parse_body(&mut self, len: usize) -> Result<String, ParseAbort> {
        let mut body = Vec::with_capacity(len);

        while body.len() < len {
            let byte = self.next_byte()?;
            body.push(byte);
        }

        String::from_utf8(body).map_err(|_| ParseAbort::Invalid)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcp::DEFAULT_MAX_BODY_LEN;
    use crate::io::MemoryStream;

    /// Parses `frame` with a fresh scheduler.  With no process context the
    /// parser cannot sleep, so any stall fails fast — fine for these tests,
    /// which either preload every byte or deliberately starve the parser.
    fn parse(frame: &[u8]) -> DcpResponse {
        let mut stream = MemoryStream::with_bytes(frame);
        let mut sched = Scheduler::new();
        DcpResponse::receive(&mut stream, &mut sched, DEFAULT_MAX_BODY_LEN)
    }

    fn assert_cleared(response: &DcpResponse, status: DcpStatus) {
        assert_eq!(response.status, status);
        assert_eq!(response.device_id, "");
        assert_eq!(response.sub_device_id, "");
        assert_eq!(response.session_id, "");
        assert_eq!(response.session_timestamp, 0);
        assert_eq!(response.content_length, 0);
        assert_eq!(response.body, "");
    }

    const FULL_FRAME: &[u8] =
        b"DEV0000000000001:SUB1\nSESS0000000000000000000000000001:42\n20\n5\nhello";

    #[test]
    fn full_frame_parses_every_field() {
        let response = parse(FULL_FRAME);

        assert_eq!(response.device_id, "DEV0000000000001");
        assert_eq!(response.sub_device_id, "SUB1");
        assert_eq!(response.session_id, "SESS0000000000000000000000000001");
        assert_eq!(response.session_timestamp, 42);
        assert_eq!(response.status, DcpStatus::Success);
        assert_eq!(response.content_length, 5);
        assert_eq!(response.body, "hello");
    }

    #[test]
    fn omitted_sub_device_leaves_the_field_empty() {
        let response = parse(b"DEVX\nSESS:7\n24\n");

        assert_eq!(response.device_id, "DEVX");
        assert_eq!(response.sub_device_id, "");
        assert_eq!(response.status, DcpStatus::SuccessNoContent);
    }

    #[test]
    fn no_body_statuses_end_after_the_status_line() {
        let no_content = parse(b"D\nS:1\n24\n");
        assert_eq!(no_content.status, DcpStatus::SuccessNoContent);
        assert_eq!(no_content.content_length, 0);
        assert_eq!(no_content.body, "");

        let server_error = parse(b"D\nS:1\n50\n");
        assert_eq!(server_error.status, DcpStatus::ServerError);
        assert_eq!(server_error.body, "");
    }

    #[test]
    fn error_status_with_empty_body_is_well_formed() {
        let response = parse(b"D\nS:9\n40\n0\n");
        assert_eq!(response.status, DcpStatus::BadRequest);
        assert_eq!(response.content_length, 0);
    }

    #[test]
    fn well_formed_frames_round_trip_through_encode() {
        let frames: [&[u8]; 4] = [
            FULL_FRAME,
            b"DEVX\nSESS:7\n24\n",
            b"A:B\nS:123\n44\n2\nno",
            b"D\nS:0\n40\n0\n",
        ];
        for frame in frames {
            let response = parse(frame);
            assert!(
                response.status != DcpStatus::InvalidResponse
                    && response.status != DcpStatus::ResponseTimeout,
                "frame {frame:?} did not parse"
            );
            assert_eq!(response.encode(), frame.to_vec(), "frame {frame:?}");
        }
    }

    #[test]
    fn non_digit_in_status_clears_the_record() {
        let response = parse(b"DEV0:\nSESS:10\n2X\n");
        assert_cleared(&response, DcpStatus::InvalidResponse);
    }

    #[test]
    fn structural_mutations_clear_the_whole_record() {
        // Corrupt structural bytes of a valid frame, one at a time:
        //
        //   A B : C D \n S E S S :  3  1  \n  2  0  \n  2  \n  o  k
        //   0 1 2 3 4  5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20
        let frame = b"AB:CD\nSESS:31\n20\n2\nok".to_vec();

        // Killing the session `:` makes the session-ID scan swallow the
        // rest of the frame and starve; every other corruption is caught as
        // a malformed field.
        let cases = [
            (5, DcpStatus::InvalidResponse),  // device-line `\n`
            (10, DcpStatus::ResponseTimeout), // session `:`
            (13, DcpStatus::InvalidResponse), // timestamp `\n`
            (14, DcpStatus::InvalidResponse), // status tens digit
            (15, DcpStatus::InvalidResponse), // status units digit
            (16, DcpStatus::InvalidResponse), // status `\n`
            (17, DcpStatus::InvalidResponse), // content-length digit
        ];

        for (index, expected) in cases {
            let mut mutated = frame.clone();
            mutated[index] = b'~';
            let response = parse(&mutated);
            assert_cleared(&response, expected);
        }
    }

    #[test]
    fn unassigned_status_code_is_invalid() {
        assert_cleared(&parse(b"D\nS:1\n21\n"), DcpStatus::InvalidResponse);
    }

    #[test]
    fn tens_digit_above_five_is_invalid() {
        assert_cleared(&parse(b"D\nS:1\n65\n"), DcpStatus::InvalidResponse);
    }

    #[test]
    fn timestamp_overflow_is_invalid() {
        // 4294967296 = u32::MAX + 1, within the 10-digit limit.
        assert_cleared(&parse(b"D\nS:4294967296\n24\n"), DcpStatus::InvalidResponse);
    }

    #[test]
    fn timestamp_with_too_many_digits_is_invalid() {
        assert_cleared(
            &parse(b"D\nS:12345678901\n24\n"),
            DcpStatus::InvalidResponse,
        );
    }

    #[test]
    fn content_length_above_the_cap_is_invalid() {
        let declared = DEFAULT_MAX_BODY_LEN + 1;
        let frame = format!("D\nS:1\n20\n{declared}\n");
        assert_cleared(&parse(frame.as_bytes()), DcpStatus::InvalidResponse);
    }

    #[test]
    fn non_utf8_body_is_invalid() {
        assert_cleared(&parse(b"D\nS:1\n20\n2\n\xff\xfe"), DcpStatus::InvalidResponse);
    }

    #[test]
    fn starved_stream_times_out_with_cleared_fields() {
        assert_cleared(&parse(b""), DcpStatus::ResponseTimeout);
    }

    #[test]
    fn truncated_body_times_out() {
        assert_cleared(&parse(b"D\nS:1\n20\n5\nhe"), DcpStatus::ResponseTimeout);
    }
}

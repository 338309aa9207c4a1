/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Device Communication Protocol (DCP).
//!
//! DCP is the compact, line-oriented request/response protocol the device
//! uses to talk to its Master node.  It is HTTP-inspired but far smaller:
//! requests carry a method, a resource, a session stamp, and an optional
//! body; responses echo the session stamp and add a two-digit status code.
//!
//! Request frame:
//! ```text
//! <METHOD> <RESOURCE>\n
//! <SESSION_ID>: <SESSION_TIMESTAMP>\n
//! <CONTENT_LENGTH>\n
//! <BODY bytes>
//! ```
//!
//! Response frame:
//! ```text
//! <DEVICE_ID>[:<SUBDEVICE_ID>]\n
//! <SESSION_ID>:<SESSION_TIMESTAMP>\n
//! <STATUS_CODE>\n
//! [<CONTENT_LENGTH>\n
//! <BODY bytes>]
//! ```
//!
//! The trailing content-length/body section is omitted for status codes
//! that never carry one (see [`DcpStatus::has_body`]).

mod request;
mod response;

pub use request::DcpRequest;
pub use response::DcpResponse;

// ── Field limits ──────────────────────────────────────────────────────────────

/// Maximum device-ID length on the wire, in bytes.
pub const DEVICE_ID_MAX_LEN: usize = 16;

/// Maximum sub-device-ID length on the wire, in bytes.
pub const SUBDEVICE_ID_MAX_LEN: usize = 8;

/// Maximum session-ID length on the wire, in bytes.
pub const SESSION_ID_MAX_LEN: usize = 32;

/// Maximum digits in a decimal numeric field (timestamp, content length).
pub const NUMERIC_MAX_DIGITS: usize = 10;

/// Default cap on response body allocation, in bytes.  Responses declaring
/// more are rejected as invalid before any allocation happens.
pub const DEFAULT_MAX_BODY_LEN: usize = 4096;

// ── Stall budget ──────────────────────────────────────────────────────────────

/// Total number of empty-stream waits permitted per response, shared across
/// every field parse.
pub const MAX_ATTEMPTS: u32 = 20;

/// Milliseconds ceded to the scheduler per empty-stream wait.  Together
/// with [`MAX_ATTEMPTS`] this bounds a response parse at roughly two
/// seconds of stalling.
pub const POLL_DELAY_MS: i32 = 100;

// ── Method ────────────────────────────────────────────────────────────────────

/// DCP request method.  Semantics mirror their HTTP/1.0 namesakes: `GET`
/// is safe and idempotent with any data in the resource string, `POST`
/// carries data in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcpMethod {
    Get,
    Post,
}

impl DcpMethod {
    /// Wire spelling of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            DcpMethod::Get => "GET",
            DcpMethod::Post => "POST",
        }
    }
}

// ── Status codes ──────────────────────────────────────────────────────────────

/// DCP response status.
///
/// Two-digit codes inspired by HTTP status classes: `2x` success, `4x`
/// request fault, `5x` server fault.  `54` and `55` are synthesized on the
/// device when the response itself cannot be obtained or understood; the
/// Master never sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DcpStatus {
    /// Request accepted and processed; the body carries the result.
    Success = 20,
    /// Request accepted and processed; no body follows.
    SuccessNoContent = 24,
    /// The Master could not process the request.
    BadRequest = 40,
    /// This device may not access the requested resource.
    Unauthorized = 41,
    /// The requested resource does not exist.
    NotFound = 44,
    /// The resource exists but rejects this method.
    MethodNotAllowed = 45,
    /// The Master timed out waiting for the full request.
    RequestTimeout = 48,
    /// The request exceeded the Master's size limit.
    RequestTooLong = 49,
    /// The Master failed while processing the request; no body follows.
    ServerError = 50,
    /// The Master is up but refusing normal requests.
    ServerDown = 53,
    /// Synthesized on the device: the response stall budget ran out.
    ResponseTimeout = 54,
    /// Synthesized on the device: the response could not be parsed.
    InvalidResponse = 55,
}

impl DcpStatus {
    /// Looks a status up by its two-digit wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            20 => Some(DcpStatus::Success),
            24 => Some(DcpStatus::SuccessNoContent),
            40 => Some(DcpStatus::BadRequest),
            41 => Some(DcpStatus::Unauthorized),
            44 => Some(DcpStatus::NotFound),
            45 => Some(DcpStatus::MethodNotAllowed),
            48 => Some(DcpStatus::RequestTimeout),
            49 => Some(DcpStatus::RequestTooLong),
            50 => Some(DcpStatus::ServerError),
            53 => Some(DcpStatus::ServerDown),
            54 => Some(DcpStatus::ResponseTimeout),
            55 => Some(DcpStatus::InvalidResponse),
            _ => None,
        }
    }

    /// The two-digit wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether a content-length/body section may follow this status on the
    /// wire.
    pub fn has_body(self) -> bool {
        !matches!(
            self,
            DcpStatus::SuccessNoContent
                | DcpStatus::ServerError
                | DcpStatus::ResponseTimeout
                | DcpStatus::InvalidResponse
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, DcpStatus::Success | DcpStatus::SuccessNoContent)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

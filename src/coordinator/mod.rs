/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Coordinator: the device's agent for all Master communication.
//!
//! The Coordinator owns the connection lifecycle, the device's assigned ID,
//! and the per-boot session.  Application code registers its sensors and
//! output devices through it and exchanges updates; the Coordinator is not
//! in the business of interpreting the payloads it ferries.
//!
//! # Registration flow
//!
//! A factory-fresh device has no ID.  On its first successful `device`
//! registration the Master assigns one, which the Coordinator persists in
//! the non-volatile store; every later boot re-announces the stored ID and
//! receives a fresh session ID for stamping requests.
//!
//! # Resources
//!
//! | Method | Resource       | Body             | Success body        |
//! |--------|----------------|------------------|---------------------|
//! | POST   | `device`       | stored ID or empty | `<id>:<session id>` |
//! | POST   | `sensor`       | sensor mnemonic  | sub-device id       |
//! | POST   | `output`       | output mnemonic  | sub-device id       |
//! | POST   | `update/<sub>` | update payload   | request-specific    |
//! | GET    | `update/<sub>` | optional payload | requested update    |

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::dcp::{DcpMethod, DcpRequest, DcpResponse, DcpStatus, SESSION_ID_MAX_LEN};
use crate::did::{read_device_id, write_device_id, NvStore};
use crate::io::ByteStream;
use crate::sched::{Runnable, Scheduler};

const RESOURCE_DEVICE: &str = "device";
const RESOURCE_SENSOR: &str = "sensor";
const RESOURCE_OUTPUT: &str = "output";
const RESOURCE_UPDATE: &str = "update";

/// Unique ID the Master assigns to one sensor or output device.
pub type SubDeviceId = u16;

/// Sensor kinds the Master understands, with their wire mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
    Humidity,
    Light,
    Motion,
    Sound,
    Moisture,
}

impl SensorType {
    pub fn mnemonic(self) -> &'static str {
        match self {
            SensorType::Temperature => "TEMP",
            SensorType::Humidity => "HUMID",
            SensorType::Light => "LIGHT",
            SensorType::Motion => "MOTION",
            SensorType::Sound => "SOUND",
            SensorType::Moisture => "MOIST",
        }
    }
}

/// Output-device kinds the Master understands, with their wire mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Led,
    Relay,
    Display,
    Buzzer,
}

impl OutputType {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OutputType::Led => "LED",
            OutputType::Relay => "RELAY",
            OutputType::Display => "DISPLAY",
            OutputType::Buzzer => "BUZZER",
        }
    }
}

/// Why a registration round trip failed.
///
/// Plain update exchanges do not produce these: they hand the raw
/// [`DcpResponse`] back to the caller, status and all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// The Master answered with a non-success status.
    #[error("master rejected the request with status {status:?}")]
    Rejected { status: DcpStatus },

    /// The Master's reply body did not have the agreed shape.
    #[error("malformed reply from master: {detail}")]
    MalformedReply { detail: &'static str },
}

/// The device's agent for Master communication.
pub struct Coordinator<S: ByteStream, N: NvStore> {
    config: DeviceConfig,
    stream: S,
    store: N,

    /// Master-assigned device ID; `0` until first registration succeeds.
    did: u8,
    /// Session ID for this boot; empty until registration succeeds.
    session_id: String,

    sensors: Vec<(SubDeviceId, SensorType)>,
    outputs: Vec<(SubDeviceId, OutputType)>,
}

impl<S: ByteStream, N: NvStore> Coordinator<S, N> {
    /// Builds a Coordinator, loading any persisted device ID from `store`.
    pub fn new(config: DeviceConfig, stream: S, store: N) -> Self {
        let did = read_device_id(&store, config.did_address).unwrap_or(0);
        if did != 0 {
            info!(did, "loaded persisted device id");
        }

        Self {
            config,
            stream,
            store,
            did,
            session_id: String::new(),
            sensors: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Master-assigned device ID, `0` while unregistered.
    pub fn device_id(&self) -> u8 {
        self.did
    }

    /// Session ID for this boot, empty while unregistered.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True once this boot has a device ID and a session.
    pub fn is_registered(&self) -> bool {
        self.did != 0 && !self.session_id.is_empty()
    }

    /// Sensors registered so far this boot.
    pub fn sensors(&self) -> &[(SubDeviceId, SensorType)] {
        &self.sensors
    }

    /// Output devices registered so far this boot.
    pub fn outputs(&self) -> &[(SubDeviceId, OutputType)] {
        &self.outputs
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Announces the device to the Master, acquiring (or confirming) its
    /// device ID and starting a fresh session.
    ///
    /// A newly assigned ID is persisted immediately so the next boot
    /// re-announces instead of re-registering.
    pub fn register_device(&mut self, sched: &mut Scheduler) -> Result<(), CoordinatorError> {
        let announce = if self.did != 0 {
            self.did.to_string()
        } else {
            String::new()
        };

        let response = self.exchange(sched, DcpMethod::Post, RESOURCE_DEVICE.into(), &announce);
        if response.status != DcpStatus::Success {
            return Err(CoordinatorError::Rejected {
                status: response.status,
            });
        }

        let (did_text, session) =
            response
                .body
                .split_once(':')
                .ok_or(CoordinatorError::MalformedReply {
                    detail: "missing id/session separator",
                })?;
        let did: u8 = did_text.parse().map_err(|_| CoordinatorError::MalformedReply {
            detail: "device id is not a byte",
        })?;
        if did == 0 {
            return Err(CoordinatorError::MalformedReply {
                detail: "device id zero is reserved",
            });
        }
        if session.is_empty() || session.len() > SESSION_ID_MAX_LEN {
            return Err(CoordinatorError::MalformedReply {
                detail: "session id empty or over-long",
            });
        }

        if did != self.did {
            write_device_id(&mut self.store, self.config.did_address, did);
            self.did = did;
        }
        self.session_id = session.to_string();

        info!(did, "registered with master");
        Ok(())
    }

    /// Registers a sensor and returns the sub-device ID the Master
    /// assigned it.  Registers the device first if this boot has not yet.
    pub fn register_sensor(
        &mut self,
        sched: &mut Scheduler,
        sensor: SensorType,
    ) -> Result<SubDeviceId, CoordinatorError> {
        self.ensure_registered(sched)?;

        let response = self.exchange(
            sched,
            DcpMethod::Post,
            RESOURCE_SENSOR.into(),
            sensor.mnemonic(),
        );
        let sub = Self::parse_sub_device_id(&response)?;

        self.sensors.push((sub, sensor));
        info!(?sensor, sub, "sensor registered");
        Ok(sub)
    }

    /// Registers an output device and returns its Master-assigned
    /// sub-device ID.
    pub fn register_output(
        &mut self,
        sched: &mut Scheduler,
        output: OutputType,
    ) -> Result<SubDeviceId, CoordinatorError> {
        self.ensure_registered(sched)?;

        let response = self.exchange(
            sched,
            DcpMethod::Post,
            RESOURCE_OUTPUT.into(),
            output.mnemonic(),
        );
        let sub = Self::parse_sub_device_id(&response)?;

        self.outputs.push((sub, output));
        info!(?output, sub, "output registered");
        Ok(sub)
    }

    // ── Updates ───────────────────────────────────────────────────────────────

    /// Pushes `data` for a sub-device to the Master.  The raw response is
    /// returned for the caller to interpret.
    pub fn send_update(
        &mut self,
        sched: &mut Scheduler,
        sub: SubDeviceId,
        data: &str,
    ) -> DcpResponse {
        self.exchange(
            sched,
            DcpMethod::Post,
            format!("{RESOURCE_UPDATE}/{sub}"),
            data,
        )
    }

    /// Asks the Master for the latest update for a sub-device, optionally
    /// qualifying the request with `data`.
    pub fn request_update(
        &mut self,
        sched: &mut Scheduler,
        sub: SubDeviceId,
        data: Option<&str>,
    ) -> DcpResponse {
        self.exchange(
            sched,
            DcpMethod::Get,
            format!("{RESOURCE_UPDATE}/{sub}"),
            data.unwrap_or(""),
        )
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn ensure_registered(&mut self, sched: &mut Scheduler) -> Result<(), CoordinatorError> {
        if self.is_registered() {
            Ok(())
        } else {
            self.register_device(sched)
        }
    }

    /// One request/response round trip over a live connection.
    fn exchange(
        &mut self,
        sched: &mut Scheduler,
        method: DcpMethod,
        resource: String,
        body: &str,
    ) -> DcpResponse {
        self.ensure_connected(sched);

        let mut request = DcpRequest::new(method, resource, self.session_id.clone());
        request.set_body(body);
        request.send(&mut self.stream, sched, self.config.max_response_body)
    }

    /// Blocks cooperatively until the stream is connected, yielding to the
    /// scheduler between attempts.  An always-on device has nothing better
    /// to do than keep trying.
    fn ensure_connected(&mut self, sched: &mut Scheduler) {
        if self.stream.connected() {
            return;
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self
                .stream
                .connect(&self.config.master_host, self.config.master_port)
            {
                debug!(
                    host = %self.config.master_host,
                    port = self.config.master_port,
                    attempts,
                    "connected to master"
                );
                return;
            }
            if self.config.connect_warn_every > 0 && attempts % self.config.connect_warn_every == 0
            {
                warn!(attempts, "master unreachable; still retrying");
            }
            sched.yield_now();
        }
    }

    fn parse_sub_device_id(response: &DcpResponse) -> Result<SubDeviceId, CoordinatorError> {
        if response.status != DcpStatus::Success {
            return Err(CoordinatorError::Rejected {
                status: response.status,
            });
        }
        response
            .body
            .parse()
            .map_err(|_| CoordinatorError::MalformedReply {
                detail: "sub-device id is not a number",
            })
    }
}

/// Background bookkeeping: keep the link up and the registration fresh.
impl<S: ByteStream, N: NvStore> Runnable for Coordinator<S, N> {
    fn run(&mut self, sched: &mut Scheduler) -> i32 {
        self.ensure_connected(sched);

        if !self.is_registered() {
            if let Err(err) = self.register_device(sched) {
                warn!(%err, "registration with master failed");
                return 1;
            }
        }

        0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

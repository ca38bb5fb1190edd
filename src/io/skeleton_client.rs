//! TCP client for a depth sensor's skeleton stream.
//!
//! One sensor server streams length-prefixed binary frames; each frame is
//! a complete snapshot of up to six tracked bodies plus the device
//! acceleration. The client blocks on its own thread and hands decoded
//! frames to the fusion cycle through a [`SnapshotBuffer`].
//!
//! # Wire Protocol
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Little-endian fields     │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! Payload: `i64` timestamp (µs), `u8` valid body count, then per valid
//! body: `i64` body id, 25 × (`f32` x, `f32` y, `f32` z, `u8` tracking
//! state), 4 hand bytes; trailing `f32` x, y, z, w device acceleration.
//! The server streams a right-handed x axis; x is negated on decode. The
//! acceleration is homogeneous and divided through by w.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use super::snapshot::SnapshotBuffer;
use crate::core::types::{
    HandStates, SkeletonBody, SkeletonFrame, TrackingState, Vec3, JOINT_COUNT, MAX_BODIES,
};

/// Bytes per serialized body: id + 25 joints (3 floats + state byte) + hand bytes.
const BODY_LEN: usize = 8 + JOINT_COUNT * 13 + 4;
/// Smallest payload: timestamp + count + acceleration, zero bodies.
const MIN_PAYLOAD_LEN: usize = 8 + 1 + 16;
/// Largest payload: all six body slots valid.
const MAX_PAYLOAD_LEN: usize = MIN_PAYLOAD_LEN + MAX_BODIES * BODY_LEN;

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("connection closed")]
    Disconnected,

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Blocking TCP client for one sensor's skeleton stream.
pub struct SkeletonClient {
    stream: TcpStream,
    payload: Vec<u8>,
}

impl SkeletonClient {
    /// Connect to a sensor server.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            payload: Vec::with_capacity(MAX_PAYLOAD_LEN),
        })
    }

    /// Set the read timeout (None blocks indefinitely).
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Receive and decode the next frame, blocking.
    pub fn recv(&mut self) -> Result<SkeletonFrame> {
        let mut length_bytes = [0u8; 4];
        read_exact_or_disconnect(&mut self.stream, &mut length_bytes)?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&length) {
            return Err(ClientError::InvalidFrame(format!(
                "payload length {length} outside [{MIN_PAYLOAD_LEN}, {MAX_PAYLOAD_LEN}]"
            )));
        }

        self.payload.resize(length, 0);
        read_exact_or_disconnect(&mut self.stream, &mut self.payload)?;
        decode_frame(&self.payload)
    }
}

fn read_exact_or_disconnect(stream: &mut TcpStream, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ClientError::Disconnected),
        Err(e) => Err(ClientError::Connection(e)),
    }
}

/// Decode a frame payload.
pub fn decode_frame(payload: &[u8]) -> Result<SkeletonFrame> {
    let mut reader = Reader::new(payload);

    let timestamp_us = reader.read_i64()?;
    let valid_count = reader.read_u8()? as usize;
    if valid_count > MAX_BODIES {
        return Err(ClientError::InvalidFrame(format!(
            "valid body count {valid_count} exceeds {MAX_BODIES} slots"
        )));
    }

    let mut frame = SkeletonFrame {
        timestamp_us,
        ..SkeletonFrame::default()
    };

    for slot in 0..valid_count {
        let id = reader.read_i64()? as u64;
        let mut body = SkeletonBody::empty(id);
        for joint in 0..JOINT_COUNT {
            // The server's coordinate frame is right-handed; negating x
            // lands in the scene frame.
            let x = -reader.read_f32()?;
            let y = reader.read_f32()?;
            let z = reader.read_f32()?;
            body.joint_positions[joint] = Vec3::new(x, y, z);
            body.joint_states[joint] = TrackingState::from_byte(reader.read_u8()?);
        }
        body.hands = HandStates {
            left_confidence: reader.read_u8()?,
            left_state: reader.read_u8()?,
            right_confidence: reader.read_u8()?,
            right_state: reader.read_u8()?,
        };
        frame.bodies[slot] = Some(body);
    }

    let ax = reader.read_f32()?;
    let ay = reader.read_f32()?;
    let az = reader.read_f32()?;
    let aw = reader.read_f32()?;
    if aw != 0.0 {
        frame.device_acceleration = Vec3::new(ax / aw, ay / aw, az / aw);
    }

    Ok(frame)
}

/// Spawn the blocking receive loop on its own thread.
///
/// Each decoded frame is swapped into `buffer`; the thread ends when the
/// server disconnects or the stream errors.
pub fn spawn_receiver(
    mut client: SkeletonClient,
    buffer: Arc<SnapshotBuffer>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut pending = Box::new(SkeletonFrame::default());
        loop {
            match client.recv() {
                Ok(frame) => {
                    *pending = frame;
                    buffer.publish(&mut pending);
                }
                Err(ClientError::Disconnected) => {
                    info!("skeleton stream closed");
                    break;
                }
                Err(err) => {
                    warn!("skeleton stream error: {err}");
                    break;
                }
            }
        }
    })
}

/// Little-endian payload cursor.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(ClientError::Truncated {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

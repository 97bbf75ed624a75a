//! Typed payloads recorded by the tracker bridge.
//!
//! Payloads are little-endian. Strings and sequences carry a `u32` length
//! prefix. A payload that ends early, or holds an invalid value, fails with
//! `Error::Decode`.

mod codec;
mod imu;
mod light;

pub use codec::{PayloadReader, PayloadWriter};
pub use imu::Imu;
pub use light::{Axis, LightSample, ViveLight};

use crate::core::Result;

/// Topic carrying `ViveLight` sweeps.
pub const TOPIC_LIGHT: &str = "/loc/vive/light";
/// Topic carrying tracker `Imu` samples.
pub const TOPIC_IMU: &str = "/loc/vive/imu";

/// A payload type that can be recorded in and read from a bag.
pub trait Message: Sized {
    /// Type name stored on the connection, e.g. `hive/ViveLight`.
    const TYPE_NAME: &'static str;

    fn encode(&self, out: &mut PayloadWriter);

    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Whether records of a connection typed `type_name` decode as `Self`.
    fn accepts(type_name: &str) -> bool {
        type_name == Self::TYPE_NAME
    }
}

/// Stamp and frame shared by every tracker message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub stamp_ns: u64,
    /// Serial of the tracker that produced the message.
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp_ns: u64, frame_id: impl Into<String>) -> Self {
        Self {
            stamp_ns,
            frame_id: frame_id.into(),
        }
    }

    pub fn encode(&self, out: &mut PayloadWriter) {
        out.put_u64(self.stamp_ns);
        out.put_str(&self.frame_id);
    }

    pub fn decode(input: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            stamp_ns: input.u64()?,
            frame_id: input.string()?,
        })
    }
}

/// Undecoded payload bytes. Accepts records of any type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage(pub Vec<u8>);

impl Message for RawMessage {
    const TYPE_NAME: &'static str = "raw/Bytes";

    fn encode(&self, out: &mut PayloadWriter) {
        out.put_bytes(&self.0);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self(bytes.to_vec()))
    }

    fn accepts(_type_name: &str) -> bool {
        true
    }
}

/// Encode `msg` into a fresh buffer.
pub fn encode_to_vec<M: Message>(msg: &M) -> Vec<u8> {
    let mut out = PayloadWriter::new();
    msg.encode(&mut out);
    out.into_inner()
}

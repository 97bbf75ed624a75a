use std::f64::consts::PI;

use crate::core::{Error, Result};
use crate::msg::{Header, Message, PayloadReader, PayloadWriter};

/// Lighthouse sweep ticks per half-turn around the sweep centre.
const ANGLE_TICKS_CENTER: f64 = 200_000.0;
const ANGLE_TICKS_PER_PI: f64 = 400_000.0;
/// Pulse length tick rate (48 MHz).
const LENGTH_TICKS_PER_SECOND: f64 = 48_000_000.0;

/// Encoded size of one sample.
const SAMPLE_LEN: usize = 2 + 8 + 8;

/// Sweep axis of a lighthouse rotor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Axis {
    Horizontal = 0,
    Vertical = 1,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }
}

impl TryFrom<u8> for Axis {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Axis::Horizontal),
            1 => Ok(Axis::Vertical),
            _ => Err(Error::Decode("axis out of range")),
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One photodiode hit within a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub sensor: u16,
    /// Sweep angle in radians, zero at the sweep centre.
    pub angle: f64,
    /// Pulse length in microseconds.
    pub length: f64,
}

impl LightSample {
    /// Convert raw driver ticks into an angle and a pulse length.
    pub fn from_ticks(sensor: u16, angle_ticks: u32, length_ticks: u16) -> Self {
        Self {
            sensor,
            angle: (PI / ANGLE_TICKS_PER_PI) * (f64::from(angle_ticks) - ANGLE_TICKS_CENTER),
            length: f64::from(length_ticks) / LENGTH_TICKS_PER_SECOND * 1_000_000.0,
        }
    }
}

/// All sensor hits of one tracker during one lighthouse sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ViveLight {
    pub header: Header,
    /// Serial of the lighthouse that swept.
    pub lighthouse: String,
    pub axis: Axis,
    pub samples: Vec<LightSample>,
}

impl Message for ViveLight {
    const TYPE_NAME: &'static str = "hive/ViveLight";

    fn encode(&self, out: &mut PayloadWriter) {
        self.header.encode(out);
        out.put_str(&self.lighthouse);
        out.put_u8(self.axis.as_u8());
        out.put_len(self.samples.len());
        for sample in &self.samples {
            out.put_u16(sample.sensor);
            out.put_f64(sample.angle);
            out.put_f64(sample.length);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut input = PayloadReader::new(bytes);
        let header = Header::decode(&mut input)?;
        let lighthouse = input.string()?;
        let axis = Axis::try_from(input.u8()?)?;
        let count = input.len(SAMPLE_LEN)?;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(LightSample {
                sensor: input.u16()?,
                angle: input.f64()?,
                length: input.f64()?,
            });
        }
        input.finish()?;
        Ok(Self {
            header,
            lighthouse,
            axis,
            samples,
        })
    }
}

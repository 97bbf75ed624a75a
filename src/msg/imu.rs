use std::f64::consts::PI;

use crate::core::Result;
use crate::msg::{Header, Message, PayloadReader, PayloadWriter};

const GRAVITY: f64 = 9.80665;
/// Raw accelerometer counts per g.
const ACC_SCALE: f64 = 4096.0;
/// Raw gyroscope counts per degree per second.
const GYRO_SCALE: f64 = 32.768;

/// Inertial sample from a tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Imu {
    pub header: Header,
    /// m/s^2
    pub linear_acceleration: [f64; 3],
    /// rad/s
    pub angular_velocity: [f64; 3],
}

impl Imu {
    /// Scale raw driver counts into SI units.
    pub fn from_raw(header: Header, acc: [i16; 3], gyr: [i16; 3]) -> Self {
        Self {
            header,
            linear_acceleration: acc.map(|count| f64::from(count) * GRAVITY / ACC_SCALE),
            angular_velocity: gyr.map(|count| f64::from(count) / GYRO_SCALE * (PI / 180.0)),
        }
    }
}

impl Message for Imu {
    const TYPE_NAME: &'static str = "sensor_msgs/Imu";

    fn encode(&self, out: &mut PayloadWriter) {
        self.header.encode(out);
        for value in self.linear_acceleration.iter().chain(&self.angular_velocity) {
            out.put_f64(*value);
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut input = PayloadReader::new(bytes);
        let header = Header::decode(&mut input)?;
        let mut linear_acceleration = [0.0; 3];
        for value in &mut linear_acceleration {
            *value = input.f64()?;
        }
        let mut angular_velocity = [0.0; 3];
        for value in &mut angular_velocity {
            *value = input.f64()?;
        }
        input.finish()?;
        Ok(Self {
            header,
            linear_acceleration,
            angular_velocity,
        })
    }
}

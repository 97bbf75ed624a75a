//! Recorded tracker data ("bags") and the solver that consumes it.
//!
//! A bag is a directory of sealed, memory-mapped chunks plus a JSON
//! connection index. `BagReader` streams the records of one topic, in stored
//! order, to a `Handler`; `Solver` is the handler for light sweeps.
//! `BagWriter` produces bags.

pub mod bag;
pub mod core;
pub mod msg;
pub mod solver;

pub use crate::bag::{
    BagConfig, BagCursor, BagIndex, BagReader, BagWriter, Connection, Handler, RecordView,
    TopicFilter,
};
pub use crate::core::{Clock, Error, HandlerError, QuantaClock, Result, SystemClock};
pub use crate::msg::{Imu, Message, ViveLight, TOPIC_IMU, TOPIC_LIGHT};
pub use crate::solver::{AxisState, Solver, Unspecified, UpdateRule};

//! Recorded bags: a directory of sealed chunk files plus a connection index.
//!
//! ```text
//! {bag}/
//!   bag.json            <- connections: id, topic, message type, counts
//!   000000000.chunk     <- chunk 0
//!   000000001.chunk     <- chunk 1
//! ```
//!
//! Records are stored in the order they were written and are never
//! re-sorted on read.

pub mod filter;
pub mod handler;
pub mod index;
pub mod reader;
pub mod writer;

pub use crate::core::HandlerError;
pub use filter::TopicFilter;
pub use handler::Handler;
pub use index::{BagIndex, Connection};
pub use reader::{BagCursor, BagReader, RecordView};
pub use writer::{BagConfig, BagWriter};

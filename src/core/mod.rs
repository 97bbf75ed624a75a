//! Storage primitives: record headers, chunk files and the chunk writer.
//!
//! Nothing in here knows about topics; the bag layer maps topics onto the
//! connection id each record carries.

pub mod chunk;
pub mod chunk_writer;
pub mod clock;
pub mod error;
pub mod header;
pub mod mmap;

pub use clock::{Clock, QuantaClock, SystemClock};
pub use error::{Error, HandlerError, Result};

//! Foundation utilities shared by the forkharness parent and child crates.

pub mod logging;
pub mod props;
pub mod ring_buffer;

pub use props::{DEBUG_FLAG, JDWP_PREFIX, KILL_AFTER_PROPERTY, SYNC_PATH_PROPERTY};
pub use ring_buffer::{RingBuffer, SharedCapture};

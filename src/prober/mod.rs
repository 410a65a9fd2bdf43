//! Probe loops: the cached heartbeat and the round-based fan-out.

pub mod cached;
pub mod round;

pub use cached::CachedProber;
pub use round::{RoundProber, RoundReport};

//! Progress reporting hooks for a load run

use crate::negotiation::Step;

/// Observer for the stages of a load
///
/// All methods default to doing nothing so implementors only override what
/// they display.
pub trait Progress {
    /// A handshake step is about to run
    fn negotiating(&mut self, _step: Step) {}

    /// Handshake complete, the cable is ready
    fn negotiated(&mut self) {}

    /// The padded image is about to be sent
    fn sending(&mut self, _total_bytes: usize) {}

    /// The transport accepted every byte of the image
    fn sent(&mut self) {}
}

/// Progress sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

mod ncc;

pub use ncc::*;

use crate::face::FaceHandle;
use crate::tables::{FibHandle, PitHandle};

// The strategy's handle on its host forwarder. Sending is a notification:
//  the strategy has already recorded the out-face on the PIT entry by the
//  time this is called, the host only has to put the interest on the wire.
pub trait Forwarding {
    fn send_interest(&mut self, pit: PitHandle, face: FaceHandle);
    // Gives up on the pending interest, producing a nack downstream. The
    //  host is expected to remove the PIT entry in response.
    fn reject_interest(&mut self, pit: PitHandle);
    fn face_is_alive(&self, face: FaceHandle) -> bool;
}

// Deferred work the strategy schedules for itself. The host drains due
//  events from the scheduler and hands them back to the strategy; an event
//  whose subject has been removed in the meantime is dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NccEvent {
    BestFaceTimeout { pit: PitHandle },
    Propagate { pit: PitHandle, fib: FibHandle },
}

use std::{error::Error, fmt};

/// The error returned when a read runs past the end of a frame.
///
/// Frames arrive from the network, so a short read is an expected event
/// rather than a bug; callers drop the frame and move on.
#[derive(Clone, PartialEq, Eq)]
pub struct SerdeErr;

impl fmt::Debug for SerdeErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SerdeErr")
    }
}

impl fmt::Display for SerdeErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "frame read out of bounds")
    }
}

impl Error for SerdeErr {}

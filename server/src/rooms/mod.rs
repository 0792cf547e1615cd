//! Meeting rooms: membership registry plus the presence, signaling and
//! caption handlers that operate on it.

pub mod captions;
pub mod presence;
pub mod registry;
pub mod signaling;

pub use registry::{JoinOutcome, LeaveOutcome, RoomRegistry};

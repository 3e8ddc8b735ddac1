// Domain layer: geometry, unit state, motion rules and the link ports.

pub mod codec;
pub mod errors;
pub mod geometry;
pub mod packet;
pub mod ports;
pub mod state;
pub mod systems;
pub mod tuning;

pub use errors::{CodecError, LinkError};
pub use packet::{CommandPacket, UnitAck};
pub use state::{Command, LinkState, Unit, UnitSnapshot};

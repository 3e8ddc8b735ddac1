// Use cases layer: fleet control, operator selection and the radio link session.

pub mod control;
pub mod fleet;
pub mod link_session;
pub mod selection;
#[cfg(test)]
pub(crate) mod test_support;
pub mod types;

pub use control::{ControlSettings, control_task};
pub use fleet::{FleetState, SelectOutcome};
pub use link_session::{LinkSession, LinkSettings};
pub use selection::{CommandSink, DispatchOutcome, DropReason, SelectionController, SendOutcome};
pub use types::{FleetUpdate, LinkEvent, SurfaceEvent};

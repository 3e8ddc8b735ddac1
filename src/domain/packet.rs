// Payloads exchanged with remote units, before byte encoding.

/// One dispatched move, addressed to a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub unit_id: u8,
    /// Whole degrees; positive turns clockwise as seen on the field.
    pub turn: i32,
    /// Whole field units to drive after the turn.
    pub distance: u32,
}

/// Notification from the peer that a unit finished its move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitAck {
    pub unit_id: u8,
}

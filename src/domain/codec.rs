// Fixed-size binary wire format shared with the unit firmware.
//
// Command (5 bytes): [unit_id, turn_sign, turn_degrees, distance / 100, distance % 100].
// Ack (1 byte): [unit_id].
//
// Values that do not fit in a byte keep their low 8 bits, the same truncation a raw byte
// array store performs; the firmware never sees more than 255 in any field.

use crate::domain::{CodecError, CommandPacket, UnitAck};

pub const COMMAND_LEN: usize = 5;
pub const ACK_LEN: usize = 1;

pub fn encode_command(packet: &CommandPacket) -> [u8; COMMAND_LEN] {
    let turn_sign = u8::from(packet.turn > 0);
    let turn_degrees = low_byte(packet.turn.unsigned_abs());
    let hundreds = low_byte(packet.distance / 100);
    let remainder = (packet.distance % 100) as u8;

    [packet.unit_id, turn_sign, turn_degrees, hundreds, remainder]
}

pub fn decode_command(bytes: &[u8]) -> Result<CommandPacket, CodecError> {
    let [unit_id, turn_sign, turn_degrees, hundreds, remainder] = <[u8; COMMAND_LEN]>::try_from(bytes)
        .map_err(|_| CodecError::Length {
            expected: COMMAND_LEN,
            actual: bytes.len(),
        })?;

    let magnitude = i32::from(turn_degrees);
    let turn = match turn_sign {
        1 => magnitude,
        0 => -magnitude,
        other => return Err(CodecError::TurnSign(other)),
    };

    Ok(CommandPacket {
        unit_id,
        turn,
        distance: u32::from(hundreds) * 100 + u32::from(remainder),
    })
}

pub fn encode_ack(ack: UnitAck) -> [u8; ACK_LEN] {
    [ack.unit_id]
}

pub fn decode_ack(bytes: &[u8]) -> Result<UnitAck, CodecError> {
    match bytes {
        [unit_id] => Ok(UnitAck { unit_id: *unit_id }),
        _ => Err(CodecError::Length {
            expected: ACK_LEN,
            actual: bytes.len(),
        }),
    }
}

fn low_byte(value: u32) -> u8 {
    (value & 0xFF) as u8
}

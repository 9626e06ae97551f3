use crate::error::ReplicationError;
use crate::protocol::command::Command;
use crate::protocol::encoding::{put_u32, ByteReader};
use crate::types::NetId;

/// A DESPAWN packet is the command byte followed by the net ID, 5 bytes
/// total.
pub fn encode(buf: &mut Vec<u8>, net_id: NetId) {
    buf.clear();
    buf.push(Command::Despawn.as_byte());
    put_u32(buf, net_id.value());
}

pub fn decode(bytes: &[u8]) -> Result<NetId, ReplicationError> {
    if bytes.len() < 5 {
        return Err(ReplicationError::invalid_data(format!(
            "despawn packet too short: {} bytes",
            bytes.len()
        )));
    }
    let mut reader = ByteReader::new(bytes);
    let command = Command::from_byte(reader.read_u8()?)?;
    if command != Command::Despawn {
        return Err(ReplicationError::invalid_data(
            "packet is not a despawn packet",
        ));
    }
    Ok(NetId::from_wire(reader.read_u32()?))
}

use crate::bridge::spawner::CUSTOM_SPAWN_SCENE_ID;
use crate::error::ReplicationError;
use crate::protocol::command::Command;
use crate::protocol::encoding::{put_cstring, put_u32, ByteReader};
use crate::types::NetId;

/// Everything below the command byte of a SPAWN packet.
///
/// ```text
/// off  size  field
///  0    1    command = SPAWN
///  1    1    scene_id   (0xFF = custom spawn, else catalog index)
///  2    4    path_id    (object-cache ID of the spawner on this peer)
///  6    4    net_id     (assigned)
/// 10    4    name_len   (UTF-8 bytes of the node name, incl. terminator)
/// 14    N    name
/// 14+N  [ 4  custom_arg_size, then variant bytes ]   iff scene_id == 0xFF
///       M    spawn-property state (variant vector, may be empty)
/// ```
#[derive(Debug, PartialEq)]
pub struct SpawnPacket<'a> {
    pub scene_id: u8,
    pub path_id: u32,
    pub net_id: NetId,
    pub name: &'a str,
    pub custom_arg: Option<&'a [u8]>,
    pub state: &'a [u8],
}

/// Smallest parseable SPAWN: header fields only, zero name bytes.
const MIN_LEN: usize = 14;

pub fn encode(buf: &mut Vec<u8>, packet: &SpawnPacket<'_>) {
    buf.clear();
    buf.push(Command::Spawn.as_byte());
    buf.push(packet.scene_id);
    put_u32(buf, packet.path_id);
    put_u32(buf, packet.net_id.value());
    put_u32(buf, packet.name.len() as u32 + 1);
    put_cstring(buf, packet.name);
    if let Some(arg) = packet.custom_arg {
        put_u32(buf, arg.len() as u32);
        buf.extend_from_slice(arg);
    }
    buf.extend_from_slice(packet.state);
}

pub fn decode(bytes: &[u8]) -> Result<SpawnPacket<'_>, ReplicationError> {
    if bytes.len() < MIN_LEN {
        return Err(ReplicationError::invalid_data(format!(
            "spawn packet too short: {} bytes",
            bytes.len()
        )));
    }
    let mut reader = ByteReader::new(bytes);
    let command = Command::from_byte(reader.read_u8()?)?;
    if command != Command::Spawn {
        return Err(ReplicationError::invalid_data(
            "packet is not a spawn packet",
        ));
    }
    let scene_id = reader.read_u8()?;
    let path_id = reader.read_u32()?;
    let net_id = NetId::from_wire(reader.read_u32()?);
    let name_len = reader.read_u32()? as usize;
    if name_len < 1 {
        return Err(ReplicationError::invalid_data("zero spawn name size"));
    }
    let name_bytes = reader.read_bytes(name_len)?;
    if name_bytes[name_len - 1] != 0 {
        return Err(ReplicationError::invalid_data(
            "spawn name is not NUL-terminated",
        ));
    }
    let name = std::str::from_utf8(&name_bytes[..name_len - 1])
        .map_err(|_| ReplicationError::invalid_data("spawn name is not valid UTF-8"))?;
    if name.is_empty() || name.contains('\0') {
        return Err(ReplicationError::invalid_data("invalid spawn name"));
    }
    let custom_arg = if scene_id == CUSTOM_SPAWN_SCENE_ID {
        let arg_size = reader.read_u32()? as usize;
        Some(reader.read_bytes(arg_size)?)
    } else {
        None
    };
    let state = reader.rest();
    Ok(SpawnPacket {
        scene_id,
        path_id,
        net_id,
        name,
        custom_arg,
        state,
    })
}

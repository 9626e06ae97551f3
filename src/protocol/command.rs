use crate::error::ReplicationError;

/// First-byte discriminator shared by all replication packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Spawn = 1,
    Despawn = 2,
    Sync = 3,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ReplicationError> {
        match byte {
            1 => Ok(Command::Spawn),
            2 => Ok(Command::Despawn),
            3 => Ok(Command::Sync),
            other => Err(ReplicationError::invalid_data(format!(
                "unknown command byte {other}"
            ))),
        }
    }
}

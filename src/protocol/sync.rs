use crate::error::ReplicationError;
use crate::protocol::command::Command;
use crate::protocol::encoding::{put_u16, put_u32, ByteReader};
use crate::types::{NetId, SyncTime};

/// Batch header: command byte plus the 16-bit time tag.
pub const HEADER_LEN: usize = 3;

/// Per-record overhead: net ID plus payload size, both u32.
pub const RECORD_HEADER_LEN: usize = 8;

/// Outcome of appending one state record to a batch.
#[derive(Debug, PartialEq)]
pub enum SyncPush {
    /// The record fit in the open batch.
    Appended,
    /// The open batch was flushed as a self-contained packet and the record
    /// went into a fresh batch carrying the same time tag.
    Flushed(Vec<u8>),
    /// The record alone exceeds the MTU and was not written. Fragmenting
    /// such records is left as future work.
    RecordTooLarge,
}

/// MTU-bounded builder for SYNC batches.
///
/// Writes into a scratch buffer reused across ticks. A single tick may
/// produce several batches to the same peer; each one is a self-contained
/// packet with its own header, and all of them share one time tag so the
/// receiver treats them as a stream.
pub struct SyncBatcher<'a> {
    buf: &'a mut Vec<u8>,
    mtu: usize,
    time: SyncTime,
}

impl<'a> SyncBatcher<'a> {
    pub fn new(buf: &'a mut Vec<u8>, mtu: usize, time: SyncTime) -> Self {
        let mut batcher = Self { buf, mtu, time };
        batcher.begin_batch();
        batcher
    }

    fn begin_batch(&mut self) {
        self.buf.clear();
        self.buf.push(Command::Sync.as_byte());
        put_u16(self.buf, self.time);
    }

    fn has_records(&self) -> bool {
        self.buf.len() > HEADER_LEN
    }

    pub fn push(&mut self, net_id: NetId, payload: &[u8]) -> SyncPush {
        let record_len = RECORD_HEADER_LEN + payload.len();
        if record_len > self.mtu {
            return SyncPush::RecordTooLarge;
        }
        let mut flushed = None;
        if self.has_records() && self.buf.len() + record_len > self.mtu {
            flushed = Some(self.buf.clone());
            self.begin_batch();
        }
        put_u32(self.buf, net_id.value());
        put_u32(self.buf, payload.len() as u32);
        self.buf.extend_from_slice(payload);
        match flushed {
            Some(packet) => SyncPush::Flushed(packet),
            None => SyncPush::Appended,
        }
    }

    /// The final partial batch, if any records are pending.
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.has_records() {
            Some(self.buf.clone())
        } else {
            None
        }
    }
}

/// Splits a received SYNC packet into its time tag and record region.
pub fn decode_header(bytes: &[u8]) -> Result<(SyncTime, &[u8]), ReplicationError> {
    if bytes.len() < HEADER_LEN + RECORD_HEADER_LEN {
        return Err(ReplicationError::invalid_data(format!(
            "sync packet too short: {} bytes",
            bytes.len()
        )));
    }
    let mut reader = ByteReader::new(bytes);
    let command = Command::from_byte(reader.read_u8()?)?;
    if command != Command::Sync {
        return Err(ReplicationError::invalid_data("packet is not a sync packet"));
    }
    let time = reader.read_u16()?;
    Ok((time, reader.rest()))
}

/// Iterates the `(net_id, payload)` records of a SYNC batch.
pub struct SyncRecordReader<'a> {
    reader: ByteReader<'a>,
}

impl<'a> SyncRecordReader<'a> {
    pub fn new(records: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(records),
        }
    }

    pub fn next_record(&mut self) -> Option<Result<(NetId, &'a [u8]), ReplicationError>> {
        if self.reader.remaining() <= RECORD_HEADER_LEN {
            return None;
        }
        Some(self.try_read())
    }

    fn try_read(&mut self) -> Result<(NetId, &'a [u8]), ReplicationError> {
        let net_id = NetId::from_wire(self.reader.read_u32()?);
        let size = self.reader.read_u32()? as usize;
        let payload = self.reader.read_bytes(size)?;
        Ok((net_id, payload))
    }
}

use crate::error::ReplicationError;

/// A typed engine value carried in spawn and sync state. The core moves
/// these around without interpreting them; encoding is delegated to the
/// [`VariantCodec`] contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Nil,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Serialization contract for typed values and variant vectors.
///
/// The core is written against this trait so it can be exercised with a
/// mock codec; the real implementation lives with the engine.
pub trait VariantCodec {
    fn encode_variant(&self, value: &Variant) -> Result<Vec<u8>, ReplicationError>;

    fn decode_variant(&self, bytes: &[u8]) -> Result<Variant, ReplicationError>;

    /// Encodes a variant vector. An empty slice encodes to zero bytes.
    fn encode_variants(&self, values: &[Variant]) -> Result<Vec<u8>, ReplicationError>;

    /// Decodes exactly `count` variants out of `bytes`.
    fn decode_variants(&self, bytes: &[u8], count: usize)
        -> Result<Vec<Variant>, ReplicationError>;
}

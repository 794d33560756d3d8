//! Encode/decode functions for the durable tier's storage format.
//!
//! Records are rkyv-archived. Decoding validates the archived bytes before
//! materializing an owned record, so corrupt or truncated values surface as
//! `CodecError` instead of undefined behavior.

use rkyv::{AlignedVec, Deserialize as RkyvDeserialize};

use crate::job::JobRecord;

/// Error type for codec operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("rkyv serialization error: {0}")]
    Serialize(String),
    #[error("invalid job record bytes: {0}")]
    Validate(String),
}

/// Serialize a job record into aligned bytes for storage.
pub fn encode_job(record: &JobRecord) -> Result<AlignedVec, CodecError> {
    rkyv::to_bytes::<_, 256>(record).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Validate and decode a stored job record into an owned value.
///
/// The store hands back unaligned byte slices; copy into an `AlignedVec`
/// before validation since the archived layout requires alignment.
pub fn decode_job(bytes: &[u8]) -> Result<JobRecord, CodecError> {
    let mut aligned = AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    let archived = rkyv::check_archived_root::<JobRecord>(&aligned)
        .map_err(|e| CodecError::Validate(e.to_string()))?;
    let mut des = rkyv::Infallible;
    Ok(RkyvDeserialize::deserialize(archived, &mut des)
        .unwrap_or_else(|_| unreachable!("infallible deserialization for JobRecord")))
}

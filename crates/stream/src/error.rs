use crate::bucket::ObjectId;

/// Errors reported by the streaming grid and its quantizer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("invalid level count {levels}: expected 1..={max}")]
    InvalidLevelCount { levels: u32, max: u32 },
    #[error("invalid bucket capacity {capacity}: expected 1..={max}")]
    InvalidBucketCapacity { capacity: u32, max: u32 },
    #[error("invalid world size {0}: must be finite and positive")]
    InvalidWorldSize(f32),
    #[error("bucket store exhausted at capacity {capacity}")]
    BucketsExhausted { capacity: u32 },
    #[error("object id {0:?} does not address a live bucket")]
    InvalidObjectId(ObjectId),
    #[error("object with payload {data:#x} not found (bucket {bucket})")]
    ObjectNotFound { bucket: u32, data: u32 },
}

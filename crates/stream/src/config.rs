use serde::{Deserialize, Serialize};

use crate::bucket::MAX_BUCKET_INDEX;
use crate::error::GridError;
use crate::level::MAX_LEVELS;
use crate::quantize::PositionQuantizer;

/// Grid construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of resolution tiers, 1..=12.
    pub num_levels: u32,
    /// Buckets available before the store must grow.
    pub bucket_capacity: u32,
    /// Side of the world cube mapped onto the quantized space.
    pub max_world_size: f32,
    /// Double the bucket store instead of failing when it runs out.
    pub allow_growth: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            num_levels: 8,
            bucket_capacity: 10_000,
            max_world_size: 65_536.0,
            allow_growth: true,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), GridError> {
        if self.num_levels == 0 || self.num_levels > MAX_LEVELS {
            return Err(GridError::InvalidLevelCount {
                levels: self.num_levels,
                max: MAX_LEVELS,
            });
        }
        if self.bucket_capacity == 0 || self.bucket_capacity > MAX_BUCKET_INDEX {
            return Err(GridError::InvalidBucketCapacity {
                capacity: self.bucket_capacity,
                max: MAX_BUCKET_INDEX,
            });
        }
        self.quantizer().map(|_| ())
    }

    /// Quantizer matching this configuration's world size.
    pub fn quantizer(&self) -> Result<PositionQuantizer, GridError> {
        PositionQuantizer::new(self.max_world_size)
    }
}

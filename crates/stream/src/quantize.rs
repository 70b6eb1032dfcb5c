use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Largest coordinate of the quantized grid space.
pub const QUANTIZED_MAX: u16 = u16::MAX;

/// A position (and optional radius) in the grid's 16-bit coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QuantizedPosition {
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub r: u16,
}

impl QuantizedPosition {
    pub fn new(x: u16, y: u16, z: u16, r: u16) -> Self {
        Self { x, y, z, r }
    }
}

/// Maps world-space floats into the grid's quantized coordinate space.
///
/// The quantized space covers a cube of side `max_world_size` centered on the
/// origin. Values outside the cube saturate to the nearest face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionQuantizer {
    max_world_size: f32,
    half_size: f32,
    scale: f32,
    inv_scale: f32,
}

impl PositionQuantizer {
    /// Create a quantizer for a world cube of the given side length.
    pub fn new(max_world_size: f32) -> Result<Self, GridError> {
        if !max_world_size.is_finite() || max_world_size <= 0.0 {
            return Err(GridError::InvalidWorldSize(max_world_size));
        }
        let scale = QUANTIZED_MAX as f32 / max_world_size;
        Ok(Self {
            max_world_size,
            half_size: max_world_size * 0.5,
            scale,
            inv_scale: max_world_size / QUANTIZED_MAX as f32,
        })
    }

    /// Side length of the quantized world cube.
    pub fn max_world_size(&self) -> f32 {
        self.max_world_size
    }

    /// Quantize a position; the radius component is zero.
    pub fn quantize_position(&self, v: Vec3) -> QuantizedPosition {
        let q = self.quantize_axes(v);
        QuantizedPosition {
            x: q.x as u16,
            y: q.y as u16,
            z: q.z as u16,
            r: 0,
        }
    }

    /// Quantize a position and a radius with the same scale. The radius is
    /// not offset.
    pub fn quantize_position_and_radius(&self, v: Vec3, r: f32) -> QuantizedPosition {
        QuantizedPosition {
            r: self.quantize_radius(r),
            ..self.quantize_position(v)
        }
    }

    /// Quantize a radius alone.
    pub fn quantize_radius(&self, r: f32) -> u16 {
        (r * self.scale).clamp(0.0, QUANTIZED_MAX as f32).round() as u16
    }

    /// Map a quantized position back to the center of its world-space quantum.
    pub fn dequantize_position(&self, q: QuantizedPosition) -> Vec3 {
        Vec3::new(q.x as f32, q.y as f32, q.z as f32) * self.inv_scale
            - Vec3::splat(self.half_size)
    }

    pub fn dequantize_radius(&self, r: u16) -> f32 {
        r as f32 * self.inv_scale
    }

    fn quantize_axes(&self, v: Vec3) -> Vec3 {
        ((v + Vec3::splat(self.half_size)) * self.scale)
            .clamp(Vec3::ZERO, Vec3::splat(QUANTIZED_MAX as f32))
            .round()
    }
}

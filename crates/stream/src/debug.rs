//! Read-only per-level diagnostics for visualization and telemetry.

use serde::Serialize;

use crate::bucket::BUCKET_CAPACITY;
use crate::grid::StreamingGrid;
use crate::quantize::QUANTIZED_MAX;

/// An element position normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DebugElement {
    pub x: f32,
    pub y: f32,
    pub r: f32,
}

/// Occupancy statistics for one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridDebugInfo {
    pub num_cells: usize,
    /// Cells along one side.
    pub grid_size: u32,
    pub num_buckets: usize,
    pub num_elements: usize,
    /// Elements per cell, row-major.
    pub cell_element_counts: Vec<u32>,
    pub max_cell_elements: u32,
    /// Buckets by number of live elements, index 0..=5.
    pub bucket_fill_histogram: [u32; BUCKET_CAPACITY + 1],
    /// Free slots in cells that needed more than one bucket.
    pub wasted_slots: usize,
    pub elements: Vec<DebugElement>,
}

impl StreamingGrid {
    /// Statistics for `level`. An out-of-range level yields empty stats.
    pub fn debug_info(&self, level: u32) -> GridDebugInfo {
        let Some(l) = self.level(level) else {
            return GridDebugInfo::default();
        };

        let mut info = GridDebugInfo {
            num_cells: l.node_count(),
            grid_size: l.side(),
            cell_element_counts: vec![0; l.node_count()],
            ..GridDebugInfo::default()
        };

        let norm = f32::from(QUANTIZED_MAX);
        for (cell, node) in l.nodes().iter().enumerate() {
            let mut cell_elements = 0usize;
            let mut cell_buckets = 0usize;
            for bucket in self.chain(node.first_bucket) {
                cell_buckets += 1;
                info.bucket_fill_histogram[bucket.len()] += 1;
                cell_elements += bucket.len();
                info.elements
                    .extend(bucket.elements().iter().map(|e| DebugElement {
                        x: f32::from(e.x) / norm,
                        y: f32::from(e.y) / norm,
                        r: f32::from(e.r) / norm,
                    }));
            }

            if cell_buckets > 1 {
                info.wasted_slots += cell_buckets * BUCKET_CAPACITY - cell_elements;
            }
            info.num_buckets += cell_buckets;
            info.num_elements += cell_elements;
            info.cell_element_counts[cell] = cell_elements as u32;
            info.max_cell_elements = info.max_cell_elements.max(cell_elements as u32);
        }
        info
    }
}

//! Level hierarchy and the pure math that places objects into it.
//!
//! Level `i` is a `2^(i+1) x 2^(i+1)` grid over the 16-bit coordinate space,
//! so a level-`i` cell spans `1 << (15 - i)` units. Level 0 is the coarsest.

use crate::bucket::BUCKET_CAPACITY;

/// Deepest level the hierarchy supports. Level 11 already holds 16M nodes.
pub const MAX_LEVELS: u32 = 12;

/// Right shift turning a 16-bit coordinate into a cell coordinate at `level`.
#[inline]
pub fn level_shift(level: u32) -> u32 {
    debug_assert!(level < 16);
    15 - level
}

/// Number of cells along one side of `level`.
#[inline]
pub fn level_side(level: u32) -> u32 {
    2 << level
}

/// Cell edge length of `level` in quantized units. An object stored at
/// `level > 0` always has a radius below this.
#[inline]
pub fn level_cell_size(level: u32) -> u32 {
    1 << level_shift(level)
}

/// Pick the finest level whose cell size exceeds `radius`. Level 0 takes
/// whatever is left.
pub fn select_level(num_levels: u32, radius: u16) -> u32 {
    debug_assert!(num_levels >= 1);
    let mut level = num_levels - 1;
    while level > 0 {
        if u32::from(radius) < level_cell_size(level) {
            break;
        }
        level -= 1;
    }
    level
}

/// Cell coordinates of a point at `level`. Z never participates.
#[inline]
pub fn cell_coords(level: u32, x: u16, y: u16) -> (u32, u32) {
    let shift = level_shift(level);
    (u32::from(x) >> shift, u32::from(y) >> shift)
}

/// Row-major node index of a point at `level`.
#[inline]
pub fn cell_index(level: u32, x: u16, y: u16) -> usize {
    let (cx, cy) = cell_coords(level, x, y);
    (cx + cy * level_side(level)) as usize
}

/// One cell of a level: the head of its bucket chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Node {
    /// First bucket of the chain, 0 when the cell is empty.
    pub first_bucket: u32,
    /// Number of buckets in the chain.
    pub bucket_count: u32,
    /// Number of elements stored across the chain.
    pub element_count: u32,
}

impl Node {
    pub fn is_empty(&self) -> bool {
        self.first_bucket == 0
    }

    /// Whether some bucket of the chain has a free slot.
    pub fn has_space(&self) -> bool {
        self.element_count < self.bucket_count * BUCKET_CAPACITY as u32
    }
}

/// One resolution tier of the grid.
#[derive(Debug, Clone)]
pub struct Level {
    index: u32,
    side: u32,
    nodes: Vec<Node>,
}

impl Level {
    pub fn new(index: u32) -> Self {
        let side = level_side(index);
        Self {
            index,
            side,
            nodes: vec![Node::default(); (side * side) as usize],
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Cells along one side.
    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, cell: usize) -> &Node {
        &self.nodes[cell]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, cell: usize) -> &mut Node {
        &mut self.nodes[cell]
    }

    /// Row-major index of cell `(cx, cy)`.
    #[inline]
    pub fn cell_at(&self, cx: u32, cy: u32) -> usize {
        (cx + cy * self.side) as usize
    }
}

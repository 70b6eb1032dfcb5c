use crate::bucket::{Bucket, BucketStore, GridElement, ObjectId};
use crate::collector::Collector;
use crate::config::GridConfig;
use crate::error::GridError;
use crate::level::{Level, cell_coords, cell_index, select_level};
use crate::quantize::QuantizedPosition;

/// Hierarchical grid of radius-bearing objects over the quantized 16-bit
/// coordinate space.
///
/// Each object lives in exactly one node of exactly one level: the finest
/// level whose cells are larger than its radius. A query therefore only has
/// to look at a 3x3 block of nodes per level to find every object whose
/// sphere contains the query point.
///
/// Objects are addressed by the [`ObjectId`] returned on registration
/// together with the caller's 32-bit payload.
#[derive(Debug)]
pub struct StreamingGrid {
    levels: Vec<Level>,
    buckets: BucketStore,
    num_elements: usize,
}

impl StreamingGrid {
    /// Create a grid with `num_levels` tiers and room for `bucket_capacity`
    /// buckets. The store grows when exhausted.
    pub fn new(num_levels: u32, bucket_capacity: u32) -> Result<Self, GridError> {
        Self::from_config(&GridConfig {
            num_levels,
            bucket_capacity,
            ..GridConfig::default()
        })
    }

    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        let levels: Vec<Level> = (0..config.num_levels).map(Level::new).collect();
        let buckets = BucketStore::new(config.bucket_capacity, config.allow_growth)?;

        let cells: usize = levels.iter().map(Level::node_count).sum();
        tracing::info!(
            levels = config.num_levels,
            cells,
            buckets = config.bucket_capacity,
            growth = config.allow_growth,
            "created streaming grid"
        );

        Ok(Self {
            levels,
            buckets,
            num_elements: 0,
        })
    }

    pub fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Current bucket capacity.
    pub fn max_buckets(&self) -> u32 {
        self.buckets.capacity()
    }

    /// Buckets currently in use.
    pub fn num_buckets(&self) -> u32 {
        self.buckets.live_count()
    }

    /// Registered objects.
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn level(&self, index: u32) -> Option<&Level> {
        self.levels.get(index as usize)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn buckets(&self) -> &BucketStore {
        &self.buckets
    }

    /// Insert an object and return the id of the bucket it landed in.
    pub fn register_object(
        &mut self,
        x: u16,
        y: u16,
        z: u16,
        radius: u16,
        data: u32,
    ) -> Result<ObjectId, GridError> {
        let level = select_level(self.num_levels(), radius);
        let cell = cell_index(level, x, y);
        let bucket = self.insert(
            level as usize,
            cell,
            GridElement {
                x,
                y,
                z,
                r: radius,
                data,
            },
        )?;
        self.num_elements += 1;

        tracing::trace!(
            data = format_args!("{data:#x}"),
            bucket,
            x,
            y,
            z,
            radius,
            level,
            "registered object"
        );
        Ok(ObjectId(bucket))
    }

    pub fn register_quantized(
        &mut self,
        pos: QuantizedPosition,
        data: u32,
    ) -> Result<ObjectId, GridError> {
        self.register_object(pos.x, pos.y, pos.z, pos.r, data)
    }

    /// Remove the object `data` from bucket `id`.
    pub fn try_unregister_object(&mut self, id: ObjectId, data: u32) -> Result<(), GridError> {
        let index = self.live_bucket(id)?;
        let slot = self
            .buckets
            .get(index)
            .position(data)
            .ok_or(GridError::ObjectNotFound {
                bucket: index,
                data,
            })?;
        self.remove_slot(index, slot);
        Ok(())
    }

    /// Like [`StreamingGrid::try_unregister_object`], but a missing object is
    /// treated as a caller bug: it panics in debug builds and is logged in
    /// release builds.
    pub fn unregister_object(&mut self, id: ObjectId, data: u32) {
        if let Err(err) = self.try_unregister_object(id, data) {
            invariant_violated("unregister_object", &err);
        }
    }

    /// Remove the object `data` by the position and radius it was registered
    /// with instead of its id.
    pub fn try_unregister_at(
        &mut self,
        x: u16,
        y: u16,
        z: u16,
        radius: u16,
        data: u32,
    ) -> Result<(), GridError> {
        let level = select_level(self.num_levels(), radius);
        let cell = cell_index(level, x, y);

        let mut index = self.levels[level as usize].node(cell).first_bucket;
        while index != 0 {
            let bucket = self.buckets.get(index);
            if let Some(slot) = bucket.position(data) {
                self.remove_slot(index, slot);
                return Ok(());
            }
            index = bucket.next();
        }

        tracing::trace!(x, y, z, radius, level, "no object at position");
        Err(GridError::ObjectNotFound { bucket: 0, data })
    }

    pub fn unregister_at(&mut self, x: u16, y: u16, z: u16, radius: u16, data: u32) {
        if let Err(err) = self.try_unregister_at(x, y, z, radius, data) {
            invariant_violated("unregister_at", &err);
        }
    }

    /// Relocate object `data` of bucket `id`. Returns the id to use from now
    /// on, which differs from `id` when the object changed cells.
    ///
    /// Fails without modifying the grid if the object is unknown or if the
    /// new cell needs a bucket the store cannot provide.
    pub fn try_move_object(
        &mut self,
        id: ObjectId,
        x: u16,
        y: u16,
        z: u16,
        data: u32,
    ) -> Result<ObjectId, GridError> {
        let index = self.live_bucket(id)?;
        let bucket = self.buckets.get(index);
        let slot = bucket.position(data).ok_or(GridError::ObjectNotFound {
            bucket: index,
            data,
        })?;
        let old = bucket.elements()[slot];
        let frees_bucket = bucket.len() == 1;

        // radius never changes, and with it the level
        let level = select_level(self.num_levels(), old.r);
        if cell_coords(level, old.x, old.y) == cell_coords(level, x, y) {
            let elem = &mut self.buckets.get_mut(index).elements_mut()[slot];
            elem.x = x;
            elem.y = y;
            elem.z = z;
            tracing::trace!(
                data = format_args!("{data:#x}"),
                bucket = index,
                x,
                y,
                z,
                "moved object within cell"
            );
            return Ok(id);
        }

        let new_cell = cell_index(level, x, y);
        if !frees_bucket
            && !self.chain_has_space(level as usize, new_cell)
            && !self.buckets.can_allocate()
        {
            return Err(GridError::BucketsExhausted {
                capacity: self.buckets.capacity(),
            });
        }

        self.remove_slot(index, slot);
        self.register_object(x, y, z, old.r, data)
    }

    /// Like [`StreamingGrid::try_move_object`], but failure is treated as a
    /// caller bug. In release builds the old id is returned.
    pub fn move_object(&mut self, id: ObjectId, x: u16, y: u16, z: u16, data: u32) -> ObjectId {
        match self.try_move_object(id, x, y, z, data) {
            Ok(new_id) => new_id,
            Err(err) => {
                invariant_violated("move_object", &err);
                id
            }
        }
    }

    /// Report every object whose sphere contains the point, keyed by squared
    /// distance.
    pub fn collect_for_point(&self, x: u16, y: u16, z: u16, out: &mut Collector<'_>) {
        let _span = tracing::trace_span!("collect_for_point").entered();

        let (mut cell_x, mut cell_y) = cell_coords(self.num_levels() - 1, x, y);
        for level in self.levels.iter().rev() {
            let side = level.side();
            debug_assert!(cell_x < side && cell_y < side);

            // objects are smaller than their cells, so one ring is enough
            let min_x = cell_x.saturating_sub(1);
            let min_y = cell_y.saturating_sub(1);
            let max_x = (cell_x + 1).min(side - 1);
            let max_y = (cell_y + 1).min(side - 1);

            for cy in min_y..=max_y {
                for cx in min_x..=max_x {
                    let first = level.node(level.cell_at(cx, cy)).first_bucket;
                    for bucket in self.chain(first) {
                        for e in bucket.elements() {
                            let dx = i64::from(e.x) - i64::from(x);
                            let dy = i64::from(e.y) - i64::from(y);
                            let dz = i64::from(e.z) - i64::from(z);
                            let d2 = dx * dx + dy * dy + dz * dz;
                            let r2 = i64::from(e.r) * i64::from(e.r);
                            if d2 <= r2 {
                                out.add(e.data, d2 as u64);
                            }
                        }
                    }
                }
            }

            cell_x /= 2;
            cell_y /= 2;
        }
        debug_assert!(cell_x == 0 && cell_y == 0);
    }

    /// Report every object whose position lies inside the rectangle, bounds
    /// included. Radius is ignored. An inverted rectangle is empty.
    pub fn collect_for_area(
        &self,
        min_x: u16,
        min_y: u16,
        max_x: u16,
        max_y: u16,
        out: &mut Collector<'_>,
    ) {
        let _span = tracing::trace_span!("collect_for_area").entered();

        if min_x > max_x || min_y > max_y {
            return;
        }

        let finest = self.num_levels() - 1;
        let (mut lo_x, mut lo_y) = cell_coords(finest, min_x, min_y);
        let (mut hi_x, mut hi_y) = cell_coords(finest, max_x, max_y);
        for level in self.levels.iter().rev() {
            for cy in lo_y..=hi_y {
                for cx in lo_x..=hi_x {
                    let first = level.node(level.cell_at(cx, cy)).first_bucket;
                    for bucket in self.chain(first) {
                        for e in bucket.elements() {
                            if (min_x..=max_x).contains(&e.x) && (min_y..=max_y).contains(&e.y) {
                                out.add(e.data, 0);
                            }
                        }
                    }
                }
            }

            lo_x /= 2;
            lo_y /= 2;
            hi_x /= 2;
            hi_y /= 2;
        }
    }

    /// Report every registered object with a zero key.
    pub fn collect_all(&self, out: &mut Collector<'_>) {
        for bucket in self.buckets.allocated() {
            for e in bucket.elements() {
                out.add(e.data, 0);
            }
        }
    }

    /// Buckets of a node chain, head first.
    pub(crate) fn chain(&self, first: u32) -> impl Iterator<Item = &Bucket> + '_ {
        std::iter::successors((first != 0).then(|| self.buckets.get(first)), move |b| {
            let next = b.next();
            (next != 0).then(|| self.buckets.get(next))
        })
    }

    fn chain_has_space(&self, level: usize, cell: usize) -> bool {
        self.levels[level].node(cell).has_space()
    }

    fn live_bucket(&self, id: ObjectId) -> Result<u32, GridError> {
        let index = id.0;
        if !self.buckets.contains(index) || self.buckets.get(index).is_empty() {
            return Err(GridError::InvalidObjectId(id));
        }
        Ok(index)
    }

    /// Append to the first chain bucket with room, or link a fresh bucket at
    /// the head of the chain.
    fn insert(&mut self, level: usize, cell: usize, elem: GridElement) -> Result<u32, GridError> {
        let node = *self.levels[level].node(cell);
        if node.has_space() {
            let mut index = node.first_bucket;
            while index != 0 {
                let bucket = self.buckets.get_mut(index);
                if !bucket.is_full() {
                    bucket.push(elem);
                    self.levels[level].node_mut(cell).element_count += 1;
                    return Ok(index);
                }
                index = bucket.next();
            }
            tracing::error!(level, cell, "node reports free slots but its chain is full");
        }

        let index = self.buckets.alloc()?;
        let node = self.levels[level].node_mut(cell);
        let bucket = self.buckets.get_mut(index);
        bucket.push(elem);
        bucket.set_next(node.first_bucket);
        node.first_bucket = index;
        node.bucket_count += 1;
        node.element_count += 1;
        Ok(index)
    }

    /// Remove one element. A bucket left empty is unlinked from its node and
    /// released.
    fn remove_slot(&mut self, index: u32, slot: usize) -> GridElement {
        let removed = self.buckets.get_mut(index).swap_remove(slot);
        self.num_elements -= 1;

        tracing::trace!(
            data = format_args!("{:#x}", removed.data),
            bucket = index,
            x = removed.x,
            y = removed.y,
            z = removed.z,
            radius = removed.r,
            remaining = self.buckets.get(index).len(),
            "unregistered object"
        );

        // the element's own position and radius name its node
        let level = select_level(self.num_levels(), removed.r) as usize;
        let cell = cell_index(level as u32, removed.x, removed.y);
        self.levels[level].node_mut(cell).element_count -= 1;
        if self.buckets.get(index).is_empty() {
            self.unlink(level, cell, index);
        }
        removed
    }

    fn unlink(&mut self, level: usize, cell: usize, index: u32) {
        let next = self.buckets.get(index).next();
        let node = self.levels[level].node_mut(cell);

        if node.first_bucket == index {
            node.first_bucket = next;
        } else {
            let mut prev = node.first_bucket;
            while prev != 0 && self.buckets.get(prev).next() != index {
                prev = self.buckets.get(prev).next();
            }
            debug_assert_ne!(prev, 0, "bucket {index} missing from its node chain");
            if prev == 0 {
                tracing::error!(bucket = index, level, cell, "bucket missing from node chain");
                return;
            }
            self.buckets.get_mut(prev).set_next(next);
        }

        node.bucket_count -= 1;
        self.buckets.release(index);
    }
}

fn invariant_violated(op: &'static str, err: &GridError) {
    tracing::error!(op, %err, "streaming grid invariant violated");
    if cfg!(debug_assertions) {
        panic!("{op}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BUCKET_CAPACITY;
    use crate::collector::CollectorEntry;

    fn make_grid(levels: u32, buckets: u32, allow_growth: bool) -> StreamingGrid {
        StreamingGrid::from_config(&GridConfig {
            num_levels: levels,
            bucket_capacity: buckets,
            allow_growth,
            ..GridConfig::default()
        })
        .unwrap()
    }

    fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
        ids.sort_unstable();
        ids
    }

    fn near(grid: &StreamingGrid, x: u16, y: u16, z: u16) -> Vec<u32> {
        let mut storage = vec![CollectorEntry::default(); 256];
        let mut out = Collector::new(&mut storage);
        grid.collect_for_point(x, y, z, &mut out);
        sorted(out.ids().collect())
    }

    fn inside(grid: &StreamingGrid, min: (u16, u16), max: (u16, u16)) -> Vec<u32> {
        let mut storage = vec![CollectorEntry::default(); 256];
        let mut out = Collector::new(&mut storage);
        grid.collect_for_area(min.0, min.1, max.0, max.1, &mut out);
        sorted(out.ids().collect())
    }

    fn everything(grid: &StreamingGrid) -> Vec<u32> {
        let mut storage = vec![CollectorEntry::default(); 256];
        let mut out = Collector::new(&mut storage);
        grid.collect_all(&mut out);
        assert!(out.entries().iter().all(|e| e.key == 0));
        sorted(out.ids().collect())
    }

    #[test]
    fn construction_validates_arguments() {
        assert!(matches!(
            StreamingGrid::new(0, 100),
            Err(GridError::InvalidLevelCount { .. })
        ));
        assert!(matches!(
            StreamingGrid::new(8, 0),
            Err(GridError::InvalidBucketCapacity { .. })
        ));

        let grid = StreamingGrid::new(8, 100).unwrap();
        assert_eq!(grid.num_levels(), 8);
        assert_eq!(grid.max_buckets(), 100);
        assert_eq!(grid.num_buckets(), 0);
        assert_eq!(grid.level(7).unwrap().side(), 256);
        assert!(grid.level(8).is_none());
    }

    #[test]
    fn registered_object_is_found_at_its_position() {
        let mut grid = make_grid(8, 64, false);
        let id = grid.register_object(1000, 1000, 50, 10, 0xabc).unwrap();
        assert_ne!(id.index(), 0);
        assert_eq!(grid.num_elements(), 1);
        assert_eq!(near(&grid, 1000, 1000, 50), vec![0xabc]);
        assert_eq!(near(&grid, 1008, 1000, 50), vec![0xabc]);
    }

    #[test]
    fn point_query_tests_full_3d_distance() {
        let mut grid = make_grid(8, 64, false);
        grid.register_object(1000, 1000, 1000, 10, 1).unwrap();
        // x/y inside the radius, z outside
        assert!(near(&grid, 1000, 1000, 1011).is_empty());
        assert_eq!(near(&grid, 1000, 1000, 1010), vec![1]);
        assert!(near(&grid, 1008, 1008, 1000).is_empty());
    }

    #[test]
    fn point_query_reaches_into_neighbour_cells() {
        let mut grid = make_grid(8, 64, false);
        // level 7 cells are 256 wide; object sits just left of a boundary
        grid.register_object(255, 300, 0, 200, 5).unwrap();
        assert_eq!(near(&grid, 450, 300, 0), vec![5]);
        assert!(near(&grid, 460, 300, 0).is_empty());
    }

    #[test]
    fn huge_radius_lands_in_level_zero_and_is_seen_everywhere() {
        let mut grid = make_grid(8, 64, false);
        grid.register_object(32768, 32768, 32768, u16::MAX, 9).unwrap();
        let info = grid.debug_info(0);
        assert_eq!(info.num_elements, 1);
        assert_eq!(near(&grid, 0, 0, 32768), vec![9]);
        assert_eq!(near(&grid, u16::MAX, u16::MAX, 32768), vec![9]);
    }

    #[test]
    fn colocated_objects_share_a_bucket_until_full() {
        let mut grid = make_grid(8, 64, false);
        let ids: Vec<ObjectId> = (0..5)
            .map(|d| grid.register_object(100, 100, 0, 1, d).unwrap())
            .collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(grid.num_buckets(), 1);

        let sixth = grid.register_object(101, 101, 0, 1, 5).unwrap();
        assert_ne!(sixth, ids[0]);
        assert_eq!(grid.num_buckets(), 2);

        let node = grid.level(7).unwrap().node(0);
        assert_eq!(node.bucket_count, 2);
        // new buckets are linked at the head of the chain
        assert_eq!(node.first_bucket, sixth.index());
    }

    #[test]
    fn unregister_removes_and_reclaims_bucket() {
        let mut grid = make_grid(8, 64, false);
        let a = grid.register_object(100, 100, 0, 1, 1).unwrap();
        let b = grid.register_object(100, 100, 0, 1, 2).unwrap();
        assert_eq!(a, b);

        grid.try_unregister_object(a, 1).unwrap();
        assert_eq!(everything(&grid), vec![2]);
        assert_eq!(grid.num_buckets(), 1);

        grid.try_unregister_object(b, 2).unwrap();
        assert!(everything(&grid).is_empty());
        assert_eq!(grid.num_buckets(), 0);
        assert_eq!(grid.num_elements(), 0);
        assert!(grid.level(7).unwrap().node(0).is_empty());
    }

    #[test]
    fn unlinking_from_middle_of_chain_keeps_the_rest() {
        let mut grid = make_grid(8, 64, false);
        // 11 objects in one cell: three buckets, head holds the 11th
        let ids: Vec<ObjectId> = (0..11)
            .map(|d| grid.register_object(10, 10, 0, 1, d).unwrap())
            .collect();
        assert_eq!(grid.level(7).unwrap().node(0).bucket_count, 3);

        // empty the middle bucket
        for d in 5..10 {
            grid.try_unregister_object(ids[d as usize], d).unwrap();
        }
        let node = grid.level(7).unwrap().node(0);
        assert_eq!(node.bucket_count, 2);
        assert_eq!(grid.num_buckets(), 2);
        assert_eq!(near(&grid, 10, 10, 0), vec![0, 1, 2, 3, 4, 10]);
    }

    #[test]
    fn unregister_reports_unknown_objects() {
        let mut grid = make_grid(8, 64, false);
        let id = grid.register_object(100, 100, 0, 1, 1).unwrap();
        assert_eq!(
            grid.try_unregister_object(id, 2),
            Err(GridError::ObjectNotFound {
                bucket: id.index(),
                data: 2
            })
        );
        assert_eq!(
            grid.try_unregister_object(ObjectId(0), 1),
            Err(GridError::InvalidObjectId(ObjectId(0)))
        );
        assert_eq!(
            grid.try_unregister_object(ObjectId(999), 1),
            Err(GridError::InvalidObjectId(ObjectId(999)))
        );

        grid.try_unregister_object(id, 1).unwrap();
        // the bucket was released, the id is stale
        assert_eq!(
            grid.try_unregister_object(id, 1),
            Err(GridError::InvalidObjectId(id))
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unregister_object")]
    fn unregister_of_missing_object_panics_in_debug() {
        let mut grid = make_grid(8, 64, false);
        let id = grid.register_object(100, 100, 0, 1, 1).unwrap();
        grid.unregister_object(id, 77);
    }

    #[test]
    fn unregister_at_rederives_the_node() {
        let mut grid = make_grid(8, 64, false);
        grid.register_object(5000, 7000, 3, 300, 42).unwrap();
        grid.register_object(5000, 7000, 3, 300, 43).unwrap();
        assert_eq!(
            grid.try_unregister_at(5000, 7000, 3, 300, 44),
            Err(GridError::ObjectNotFound { bucket: 0, data: 44 })
        );
        grid.try_unregister_at(5000, 7000, 3, 300, 42).unwrap();
        assert_eq!(everything(&grid), vec![43]);
        grid.unregister_at(5000, 7000, 3, 300, 43);
        assert_eq!(grid.num_buckets(), 0);
    }

    #[test]
    fn move_within_cell_keeps_id() {
        let mut grid = make_grid(8, 64, false);
        let id = grid.register_object(1000, 1000, 0, 10, 7).unwrap();
        let moved = grid.move_object(id, 1010, 1020, 5, 7);
        assert_eq!(moved, id);
        assert_eq!(near(&grid, 1010, 1020, 5), vec![7]);
        assert!(near(&grid, 990, 990, 0).is_empty());
    }

    #[test]
    fn move_across_cells_relocates() {
        let mut grid = make_grid(8, 64, false);
        let other = grid.register_object(1000, 1000, 0, 10, 1).unwrap();
        let id = grid.register_object(1000, 1000, 0, 10, 2).unwrap();
        assert_eq!(other, id);

        let moved = grid.move_object(id, 40000, 40000, 0, 2);
        assert_ne!(moved, id);
        assert_eq!(near(&grid, 40000, 40000, 0), vec![2]);
        assert_eq!(near(&grid, 1000, 1000, 0), vec![1]);
        assert_eq!(grid.num_elements(), 2);
        assert_eq!(grid.num_buckets(), 2);
    }

    #[test]
    fn move_of_unknown_object_fails() {
        let mut grid = make_grid(8, 64, false);
        let id = grid.register_object(1000, 1000, 0, 10, 1).unwrap();
        assert!(matches!(
            grid.try_move_object(id, 0, 0, 0, 2),
            Err(GridError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn failed_move_leaves_grid_untouched() {
        let mut grid = make_grid(8, 2, false);
        let a = grid.register_object(100, 100, 0, 10, 1).unwrap();
        grid.register_object(100, 100, 0, 10, 2).unwrap();
        for d in 10..15 {
            grid.register_object(1000, 1000, 0, 10, d).unwrap();
        }

        assert_eq!(
            grid.try_move_object(a, 1000, 1000, 0, 1),
            Err(GridError::BucketsExhausted { capacity: 2 })
        );
        assert_eq!(near(&grid, 100, 100, 0), vec![1, 2]);
        assert_eq!(grid.num_elements(), 7);

        // once the source bucket would be emptied the move can reuse it
        grid.try_unregister_object(a, 2).unwrap();
        let moved = grid.try_move_object(a, 1000, 1000, 0, 1).unwrap();
        assert_eq!(moved, a);
        assert_eq!(near(&grid, 1000, 1000, 0), vec![1, 10, 11, 12, 13, 14]);
        assert!(near(&grid, 100, 100, 0).is_empty());
    }

    #[test]
    fn fixed_store_reports_exhaustion() {
        let mut grid = make_grid(8, 1, false);
        for d in 0..5 {
            grid.register_object(100, 100, 0, 1, d).unwrap();
        }
        assert_eq!(
            grid.register_object(100, 100, 0, 1, 5),
            Err(GridError::BucketsExhausted { capacity: 1 })
        );
        assert_eq!(
            grid.register_object(9000, 9000, 0, 1, 6),
            Err(GridError::BucketsExhausted { capacity: 1 })
        );
        assert_eq!(grid.num_elements(), 5);
    }

    #[test]
    fn growth_keeps_issued_ids_valid() {
        let mut grid = make_grid(8, 1, true);
        let ids: Vec<ObjectId> = (0..3u16)
            .map(|i| grid.register_object(i * 1000, 0, 0, 1, u32::from(i)).unwrap())
            .collect();
        assert_eq!(grid.max_buckets(), 4);
        assert_eq!(grid.num_buckets(), 3);
        for (i, id) in ids.iter().enumerate() {
            grid.try_unregister_object(*id, i as u32).unwrap();
        }
        assert_eq!(grid.num_buckets(), 0);
    }

    #[test]
    fn churn_reuses_buckets_without_growing() {
        let mut grid = make_grid(8, 2, false);
        for i in 0..500u32 {
            let x = (i * 131 % 65536) as u16;
            let id = grid.register_object(x, x, 0, 1, i).unwrap();
            grid.try_unregister_object(id, i).unwrap();
        }
        assert_eq!(grid.max_buckets(), 2);
        assert_eq!(grid.num_buckets(), 0);
    }

    #[test]
    fn one_cell_can_hold_more_than_u16_max_buckets() {
        let buckets = u32::from(u16::MAX) + 2;
        let count = buckets * BUCKET_CAPACITY as u32;
        let mut grid = make_grid(8, 1 << 16, true);
        let mut ids = Vec::with_capacity(count as usize);
        for data in 0..count {
            // radius beyond any cell size lands on level 0
            ids.push(grid.register_object(100, 100, 0, 40000, data).unwrap());
        }

        let node = *grid.level(0).unwrap().node(0);
        assert_eq!(node.bucket_count, buckets);
        assert_eq!(node.element_count, count);
        assert!(!node.has_space());
        assert_eq!(grid.num_buckets(), buckets);

        let info = grid.debug_info(0);
        assert_eq!(info.num_buckets, buckets as usize);
        assert_eq!(info.num_elements, count as usize);
        assert_eq!(info.cell_element_counts[0], count);
        assert_eq!(info.wasted_slots, 0);

        // a hole deep in the chain is found again before a new bucket
        grid.unregister_object(ids[0], 0);
        assert!(grid.level(0).unwrap().node(0).has_space());
        assert_eq!(grid.register_object(100, 100, 0, 40000, 0).unwrap(), ids[0]);
        assert_eq!(grid.num_buckets(), buckets);

        // newest buckets sit at the head of the chain
        for (data, id) in ids.iter().enumerate().rev() {
            grid.try_unregister_object(*id, data as u32).unwrap();
        }
        let node = *grid.level(0).unwrap().node(0);
        assert!(node.is_empty());
        assert_eq!((node.bucket_count, node.element_count), (0, 0));
        assert_eq!(grid.num_elements(), 0);
    }

    #[test]
    fn area_query_uses_positions_only() {
        let mut grid = make_grid(8, 64, false);
        grid.register_object(1000, 1000, 0, 10, 1).unwrap();
        grid.register_object(2000, 2000, 0, 5000, 2).unwrap();
        grid.register_object(3000, 1000, 0, 10, 3).unwrap();

        assert_eq!(inside(&grid, (900, 900), (2100, 2100)), vec![1, 2]);
        // radius of object 2 overlaps but its position does not
        assert!(inside(&grid, (2100, 2100), (2500, 2500)).is_empty());
        // bounds are inclusive
        assert_eq!(inside(&grid, (3000, 1000), (3000, 1000)), vec![3]);
    }

    #[test]
    fn area_query_with_inverted_bounds_is_empty() {
        let mut grid = make_grid(8, 64, false);
        grid.register_object(1000, 1000, 0, 10, 1).unwrap();
        assert!(inside(&grid, (2000, 2000), (500, 500)).is_empty());
        assert!(inside(&grid, (500, 2000), (2000, 500)).is_empty());
        assert!(inside(&grid, (2000, 500), (500, 2000)).is_empty());
        assert_eq!(inside(&grid, (500, 500), (2000, 2000)), vec![1]);
        assert_eq!(inside(&grid, (0, 0), (u16::MAX, u16::MAX)), vec![1]);
    }

    #[test]
    fn collect_all_skips_released_buckets() {
        let mut grid = make_grid(8, 64, false);
        let a = grid.register_object(1, 1, 0, 1, 1).unwrap();
        grid.register_object(60000, 60000, 0, 1, 2).unwrap();
        grid.register_object(30000, 60000, 0, 20000, 3).unwrap();
        assert_eq!(everything(&grid), vec![1, 2, 3]);
        grid.unregister_object(a, 1);
        assert_eq!(everything(&grid), vec![2, 3]);
    }

    #[test]
    fn register_quantized_matches_register_object() {
        let mut grid = make_grid(4, 16, false);
        let pos = QuantizedPosition::new(123, 456, 789, 12);
        grid.register_quantized(pos, 99).unwrap();
        assert_eq!(near(&grid, 123, 456, 789), vec![99]);
    }

    #[test]
    fn single_level_grid_works() {
        let mut grid = make_grid(1, 16, false);
        grid.register_object(10, 10, 0, 5, 1).unwrap();
        grid.register_object(60000, 60000, 0, 5, 2).unwrap();
        assert_eq!(near(&grid, 12, 12, 0), vec![1]);
        assert_eq!(inside(&grid, (0, 0), (u16::MAX, u16::MAX)), vec![1, 2]);
    }
}

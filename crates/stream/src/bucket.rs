//! Cache-line sized element buckets and the index-stable store that owns them.
//!
//! Buckets link to each other by index, never by pointer. The store hands
//! out indices from a free pool and only ever appends to its backing `Vec`,
//! so an index stays valid for as long as its bucket is allocated, even
//! across growth.

use bytemuck::Zeroable;

use crate::error::GridError;

/// Elements held by one bucket.
pub const BUCKET_CAPACITY: usize = 5;

/// Largest bucket index representable in the 24-bit `next` link.
pub const MAX_BUCKET_INDEX: u32 = (1 << 24) - 1;

const COUNT_MASK: u32 = 0xff;
const NEXT_SHIFT: u32 = 8;

/// Handle returned when an object is registered.
///
/// This is the index of the bucket holding the object. Objects sharing a
/// bucket share the id, so it must always be paired with the object's
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The stored record for one object.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct GridElement {
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub r: u16,
    pub data: u32,
}

/// Fixed-capacity block of elements, exactly one cache line.
///
/// The trailing header packs the live element count into the low 8 bits and
/// the next bucket index into the high 24 bits.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct Bucket {
    elems: [GridElement; BUCKET_CAPACITY],
    header: u32,
}

const _: () = assert!(std::mem::size_of::<GridElement>() == 12);
const _: () = assert!(std::mem::size_of::<Bucket>() == 64);

impl Bucket {
    #[inline]
    pub fn len(&self) -> usize {
        (self.header & COUNT_MASK) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= BUCKET_CAPACITY
    }

    /// Index of the next bucket in the chain, 0 at the end.
    #[inline]
    pub fn next(&self) -> u32 {
        self.header >> NEXT_SHIFT
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: u32) {
        debug_assert!(next <= MAX_BUCKET_INDEX);
        self.header = (next << NEXT_SHIFT) | (self.header & COUNT_MASK);
    }

    #[inline]
    fn set_len(&mut self, len: usize) {
        debug_assert!(len <= BUCKET_CAPACITY);
        self.header = (self.header & !COUNT_MASK) | len as u32;
    }

    /// Live elements.
    #[inline]
    pub fn elements(&self) -> &[GridElement] {
        &self.elems[..self.len()]
    }

    #[inline]
    pub(crate) fn elements_mut(&mut self) -> &mut [GridElement] {
        let len = self.len();
        &mut self.elems[..len]
    }

    /// Slot of the first element carrying `data`.
    #[inline]
    pub fn position(&self, data: u32) -> Option<usize> {
        self.elements().iter().position(|e| e.data == data)
    }

    pub(crate) fn push(&mut self, elem: GridElement) {
        let len = self.len();
        debug_assert!(len < BUCKET_CAPACITY, "push into full bucket");
        self.elems[len] = elem;
        self.set_len(len + 1);
    }

    /// Remove the element at `slot`, moving the last live element into its
    /// place. The vacated tail slot is zeroed.
    pub(crate) fn swap_remove(&mut self, slot: usize) -> GridElement {
        let last = self.len() - 1;
        let removed = self.elems[slot];
        self.elems[slot] = self.elems[last];
        self.elems[last] = GridElement::zeroed();
        self.set_len(last);
        removed
    }
}

/// Arena of buckets with an O(1) free pool.
///
/// Index 0 is a sentinel standing for "no bucket" and is never allocated.
#[derive(Debug)]
pub struct BucketStore {
    buckets: Vec<Bucket>,
    free: Vec<u32>,
    capacity: u32,
    allow_growth: bool,
}

impl BucketStore {
    /// Create a store able to hold `capacity` buckets. With `allow_growth`
    /// the capacity doubles when exhausted, up to [`MAX_BUCKET_INDEX`].
    pub fn new(capacity: u32, allow_growth: bool) -> Result<Self, GridError> {
        if capacity == 0 || capacity > MAX_BUCKET_INDEX {
            return Err(GridError::InvalidBucketCapacity {
                capacity,
                max: MAX_BUCKET_INDEX,
            });
        }
        let mut buckets = Vec::with_capacity(capacity as usize + 1);
        buckets.push(Bucket::zeroed());
        Ok(Self {
            buckets,
            free: Vec::new(),
            capacity,
            allow_growth,
        })
    }

    /// Maximum number of buckets before the store must grow.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Buckets currently handed out.
    pub fn live_count(&self) -> u32 {
        (self.buckets.len() - 1 - self.free.len()) as u32
    }

    /// Whether [`BucketStore::alloc`] would succeed.
    pub fn can_allocate(&self) -> bool {
        !self.free.is_empty()
            || self.high_water() < self.capacity
            || (self.allow_growth && self.capacity < MAX_BUCKET_INDEX)
    }

    /// Whether `index` addresses a slot that has ever been allocated.
    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        index != 0 && (index as usize) < self.buckets.len()
    }

    #[inline]
    pub fn get(&self, index: u32) -> &Bucket {
        &self.buckets[index as usize]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: u32) -> &mut Bucket {
        &mut self.buckets[index as usize]
    }

    /// Every slot ever allocated, free ones included (they are empty).
    pub fn allocated(&self) -> &[Bucket] {
        &self.buckets[1..]
    }

    /// Hand out an empty, unlinked bucket.
    pub fn alloc(&mut self) -> Result<u32, GridError> {
        if let Some(index) = self.free.pop() {
            debug_assert!(self.get(index).is_empty());
            return Ok(index);
        }
        if self.high_water() >= self.capacity {
            self.grow()?;
        }
        let index = self.buckets.len() as u32;
        self.buckets.push(Bucket::zeroed());
        Ok(index)
    }

    /// Return an emptied bucket to the pool.
    pub(crate) fn release(&mut self, index: u32) {
        debug_assert!(self.contains(index));
        debug_assert!(self.get(index).is_empty(), "releasing non-empty bucket");
        self.buckets[index as usize] = Bucket::zeroed();
        self.free.push(index);
    }

    fn high_water(&self) -> u32 {
        (self.buckets.len() - 1) as u32
    }

    fn grow(&mut self) -> Result<(), GridError> {
        if !self.allow_growth || self.capacity >= MAX_BUCKET_INDEX {
            return Err(GridError::BucketsExhausted {
                capacity: self.capacity,
            });
        }
        let new_capacity = self.capacity.saturating_mul(2).min(MAX_BUCKET_INDEX);
        tracing::warn!(
            old = self.capacity,
            new = new_capacity,
            "bucket store exhausted, growing"
        );
        self.buckets
            .reserve((new_capacity - self.capacity) as usize);
        self.capacity = new_capacity;
        Ok(())
    }
}

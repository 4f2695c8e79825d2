use tracing::trace;

use crate::engine::component::{ComponentKindDesc, ZeroFn};
use crate::engine::types::{
    ComponentKindId, EntityTypeId, LogicalIndex, PhysicalIndex, INITIAL_RANGE_CAPACITY,
    MAX_PAYLOAD_ALIGN,
};


/// Backing cell for component buffers. One cell per `MAX_PAYLOAD_ALIGN`
/// bytes keeps every instance offset suitably aligned, since instance sizes
/// are always a multiple of their alignment. The bytes are only ever
/// accessed through raw pointers.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Slot(#[allow(dead_code)] [u8; MAX_PAYLOAD_ALIGN]);

const ZERO_SLOT: Slot = Slot([0u8; MAX_PAYLOAD_ALIGN]);

/// Per-component-kind storage: one growable contiguous buffer of fixed-size
/// payload slots plus the buffer-wide physical-to-logical reverse map.
///
/// Invariant:
/// - `capacity` is zero before setup and a power of two afterwards.
/// - `data` holds at least `capacity * instance_size` bytes.
/// - `physical_to_logical.len() == capacity`.
/// - The kind's ranges occupy `[ranges_first, ranges_first + ranges_count)`
///   of the shared ranges table, back to back in first-appearance order of
///   their owning entity types.
pub struct ComponentStore {
    pub(crate) name: &'static str,
    pub(crate) instance_size: u32,
    pub(crate) align: u32,
    pub(crate) zero: ZeroFn,
    pub(crate) ranges_first: u32,
    pub(crate) ranges_count: u32,
    pub(crate) capacity: u32,
    data: Vec<Slot>,
    pub(crate) physical_to_logical: Vec<LogicalIndex>,
}

impl ComponentStore {

    /// Creates an unallocated store from a validated descriptor.
    pub(crate) fn new(desc: ComponentKindDesc) -> Self {
        Self {
            name: desc.name,
            instance_size: desc.instance_size,
            align: desc.align,
            zero: desc.zero,
            ranges_first: 0,
            ranges_count: 0,
            capacity: 0,
            data: Vec::new(),
            physical_to_logical: Vec::new(),
        }
    }

    /// Diagnostic label of the payload shape this store holds.
    pub fn name(&self) -> &'static str { self.name }

    /// Payload size in bytes.
    pub fn instance_size(&self) -> u32 { self.instance_size }

    /// Current buffer capacity in instances. Zero before setup.
    pub fn capacity(&self) -> u32 { self.capacity }

    #[inline]
    fn slots_for(&self, instances: u32) -> usize {
        let bytes = instances as usize * self.instance_size as usize;
        bytes.div_ceil(MAX_PAYLOAD_ALIGN)
    }

    /// Allocates the instance buffer and reverse map at the initial
    /// capacity. Called once, during setup.
    pub(crate) fn allocate(&mut self) {
        debug_assert_eq!(self.capacity, 0, "component buffer allocated twice");
        self.capacity = INITIAL_RANGE_CAPACITY;
        let slots = self.slots_for(self.capacity);
        self.data.resize(slots, ZERO_SLOT);
        self.physical_to_logical.resize(self.capacity as usize, 0);
    }

    /// Doubles the buffer capacity, moving existing instances.
    ///
    /// Only ever triggered by push-back on the kind's last range; interior
    /// ranges grow by sliding instead.
    pub(crate) fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        trace!(
            component = self.name,
            from = self.capacity,
            to = new_capacity,
            "growing component buffer"
        );
        self.capacity = new_capacity;
        let slots = self.slots_for(new_capacity);
        self.data.resize(slots, ZERO_SLOT);
        self.physical_to_logical.resize(new_capacity as usize, 0);
    }

    /// Base pointer of the instance buffer.
    #[inline]
    pub(crate) fn base_ptr(&self) -> *const u8 {
        self.data.as_ptr() as *const u8
    }

    /// Mutable base pointer of the instance buffer.
    #[inline]
    pub(crate) fn base_ptr_mut(&mut self) -> *mut u8 {
        self.data.as_mut_ptr() as *mut u8
    }

    /// Pointer to the instance at physical slot `index`.
    #[inline]
    pub(crate) fn instance_ptr(&self, index: PhysicalIndex) -> *const u8 {
        debug_assert!(index < self.capacity);
        debug_assert_eq!(self.base_ptr() as usize % self.align as usize, 0);
        unsafe { self.base_ptr().add(index as usize * self.instance_size as usize) }
    }

    /// Mutable pointer to the instance at physical slot `index`.
    #[inline]
    pub(crate) fn instance_ptr_mut(&mut self, index: PhysicalIndex) -> *mut u8 {
        debug_assert!(index < self.capacity);
        unsafe { self.base_ptr_mut().add(index as usize * self.instance_size as usize) }
    }

    /// Runs the kind's zero-construct hook on slot `index`.
    #[inline]
    pub(crate) fn zero_instance(&mut self, index: PhysicalIndex) {
        let size = self.instance_size as usize;
        let ptr = self.instance_ptr_mut(index);
        unsafe { (self.zero)(ptr, size) };
    }

    /// Copies the instance at `src` over the instance at `dst`.
    #[inline]
    pub(crate) fn copy_instance(&mut self, src: PhysicalIndex, dst: PhysicalIndex) {
        if src == dst {
            return;
        }
        let size = self.instance_size as usize;
        let base = self.base_ptr_mut();
        // Distinct slots of one stride never overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(
                base.add(src as usize * size),
                base.add(dst as usize * size),
                size,
            );
        }
    }

    /// Reads the instance at physical slot `index` as a `&T`.
    ///
    /// # Safety
    /// `T` must be the payload type this kind was registered with, and
    /// `index` must hold a live instance.
    #[inline]
    pub(crate) unsafe fn instance_ref<T>(&self, index: PhysicalIndex) -> &T {
        debug_assert_eq!(std::mem::size_of::<T>(), self.instance_size as usize);
        unsafe { &*(self.instance_ptr(index) as *const T) }
    }

    /// Reads the instance at physical slot `index` as a `&mut T`.
    ///
    /// # Safety
    /// Same contract as [`instance_ref`](Self::instance_ref).
    #[inline]
    pub(crate) unsafe fn instance_mut<T>(&mut self, index: PhysicalIndex) -> &mut T {
        debug_assert_eq!(std::mem::size_of::<T>(), self.instance_size as usize);
        unsafe { &mut *(self.instance_ptr_mut(index) as *mut T) }
    }
}

/// The contiguous sub-slice of one component kind's buffer owned by one
/// entity type.
///
/// Invariant:
/// - Live instances occupy `[first, first + len)`.
/// - `len` equals the owning entity type's alive count.
/// - `logical_to_physical[k]` is the buffer-absolute slot of logical index
///   `k`'s instance, for every live `k`; entries of free logical indices
///   are stale.
#[derive(Clone, Default)]
pub struct ComponentRange {
    pub(crate) first: PhysicalIndex,
    pub(crate) len: u32,
    pub(crate) entity_type_index: EntityTypeId,
    pub(crate) logical_to_physical: Vec<PhysicalIndex>,
}

impl ComponentRange {

    /// First physical slot of this range.
    pub fn first(&self) -> PhysicalIndex { self.first }

    /// Number of live instances in this range.
    pub fn len(&self) -> u32 { self.len }

    /// Returns `true` if the range holds no live instances.
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Owning entity type.
    pub fn entity_type(&self) -> EntityTypeId { self.entity_type_index }
}

/// Ties one slot of an entity type's component set to its component kind
/// and, after setup, to that kind's range for the entity type.
#[derive(Clone, Copy, Debug)]
pub struct ComponentRef {
    pub(crate) kind: ComponentKindId,
    pub(crate) range_global_index: u32,
}

/// Opens one zeroed slot at the end of the range at `range_index`,
/// returning its buffer-absolute physical index.
///
/// This is the slide protocol. If the range is the last of its component
/// kind, the buffer doubles when full. Otherwise the successor range is
/// recursively pushed back, its first live instance is relocated into the
/// slot that opened at its end, and its start shifts up by one; the vacated
/// slot becomes this range's new back. Every slot returned has been run
/// through the kind's zero-construct hook.
///
/// The caller is responsible for recording the new instance in both maps
/// and bumping the range length.
pub(crate) fn range_push_back(
    store: &mut ComponentStore,
    ranges: &mut [ComponentRange],
    range_index: usize,
) -> PhysicalIndex {
    let back = ranges[range_index].first + ranges[range_index].len;
    let last_range = (store.ranges_first + store.ranges_count) as usize - 1;

    if range_index < last_range {
        let next_first = ranges[range_index + 1].first;
        if back >= next_first {
            // Ranges are kept tight; a gap only appears after a prior slide.
            debug_assert_eq!(back, next_first, "component ranges out of order");

            let opened = range_push_back(store, ranges, range_index + 1);

            if ranges[range_index + 1].len > 0 {
                store.copy_instance(next_first, opened);
                let moved = store.physical_to_logical[next_first as usize];
                store.physical_to_logical[opened as usize] = moved;
                ranges[range_index + 1].logical_to_physical[moved as usize] = opened;
            }
            ranges[range_index + 1].first += 1;
        }
    } else if back >= store.capacity {
        store.grow();
    }

    store.zero_instance(back);
    back
}

//! Segment math and position allocation.
//!
//! A download is tiled into fixed-size byte-range segments; the allocator
//! hands out start offsets (fresh positions first, then failed ones from a
//! FIFO retry queue). Pure bookkeeping, no I/O.

mod allocator;
mod range;

pub use allocator::SegmentAllocator;
pub use range::Segment;

//! Object pooling.
//!
//! - [`Slab`]: bounded, index addressed storage of reusable values
//! - [`Pooled`]: a borrowed value, returned to its slab on drop
//! - [`Recycle`]: resets a value before it is lent again
//! - [`ObjectPool`]: the request and response slabs plus the worker slots

mod bitset;
mod object_pool;
mod slab;

pub use object_pool::ObjectPool;
pub use slab::Pooled;
pub use slab::Recycle;
pub use slab::Slab;

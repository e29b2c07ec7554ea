//! Paged generational handle table
//!
//! [`HandleTable`] hands out opaque 64-bit [`Handle`]s and maps each one to a
//! pointer-sized payload. Handles carry the generation of their slot, so a
//! handle kept past `deallocate` is rejected instead of reaching whatever
//! object reuses the slot.
//!
//! The table is single-threaded. Wrap it in a `Mutex` to share it.
//!
//! 分页代数 handle 表
//!
//! [`HandleTable`] 分发不透明的 64 位 [`Handle`]，并将每个 handle 映射到指针大小的负载。

mod entry;
mod error;
mod handle;
mod page;
mod table;
mod utils;

pub use error::HandleTableError;
pub use handle::Handle;
pub use table::HandleTable;

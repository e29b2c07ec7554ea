use std::collections::TryReserveError;

use thiserror::Error;

/// Error type for HandleTable growth
///
/// Only growth can fail. Stale or forged handles are reported through
/// `false` / `None` from the accessors, never through this type.
///
/// HandleTable 扩容的错误类型
///
/// 只有扩容会失败。过期或伪造的 handle 通过访问器返回的 `false` / `None` 报告，
/// 不会使用此类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleTableError {
    /// Adding a page would exceed the configured capacity limit
    ///
    /// 添加页面会超过配置的容量上限
    #[error("handle table is full: capacity limit of {limit} slots reached")]
    CapacityExhausted { limit: usize },

    /// The allocator refused memory for a new page
    ///
    /// 分配器无法为新页面提供内存
    #[error("failed to allocate a handle table page")]
    AllocationFailed(#[from] TryReserveError),
}

use crate::entry::{Entry, FREE_LIST_END};
use crate::error::HandleTableError;
use crate::handle::Handle;
use crate::page::PageTree;
use crate::utils::{likely, unlikely};
use std::ffi::c_void;
use std::fmt;
use std::ptr;

/// HandleTable maps opaque 64-bit handles to pointer-sized payloads
///
/// Slots live in a tree of fixed-size pages (`1 << PAGE_BITS` entries each)
/// that grows one page at a time and never shrinks. Free slots are threaded
/// into a free list, and every slot carries a generation that is bumped when
/// it is deallocated, so stale handles are rejected instead of aliasing the
/// next occupant.
///
/// The table stores payload pointers but never dereferences or frees them.
///
/// HandleTable 将不透明的 64 位 handle 映射到指针大小的负载
///
/// slot 存放在由固定大小页面组成的树中，每次增长一页且从不收缩。
/// 空闲 slot 串成空闲列表，每个 slot 带有代数，在释放时递增，
/// 因此过期的 handle 会被拒绝，而不会指向下一个占用者。
///
/// 表保存负载指针，但从不解引用或释放它们。
///
/// # Features (特性)
///
/// - O(1) allocation and deallocation | O(1) 分配和释放
/// - O(height) lookup, no reallocation on growth | O(height) 查找，增长时不重新分配
/// - Generational handles reject use-after-free | 代数 handle 拒绝释放后使用
/// - Failed growth leaves the table untouched | 扩容失败时表保持不变
///
/// # Examples (示例)
///
/// ```
/// use handle_table::HandleTable;
///
/// let mut object = 42u32;
/// let mut table: HandleTable<u32> = HandleTable::new();
///
/// let handle = table.allocate().unwrap();
/// assert!(table.set(handle, &mut object));
/// assert_eq!(table.get(handle), Some(&mut object as *mut u32));
///
/// assert!(table.deallocate(handle));
/// assert_eq!(table.get(handle), None);
/// ```
pub struct HandleTable<T = c_void, const PAGE_BITS: u32 = 8> {
    pages: PageTree<T, PAGE_BITS>,
    first_free: u32, // Head of free list | 空闲列表的头部索引
    count: u32,      // Live slots | 占用的 slot 数量
    limit: usize,    // Max slots, whole pages | 最大 slot 数（整页）
}

// SAFETY: the table only stores and returns payload pointers as plain values;
// it never reads or writes through them.
unsafe impl<T, const PAGE_BITS: u32> Send for HandleTable<T, PAGE_BITS> {}
unsafe impl<T, const PAGE_BITS: u32> Sync for HandleTable<T, PAGE_BITS> {}

impl<T, const PAGE_BITS: u32> HandleTable<T, PAGE_BITS> {
    /// Number of entries per page
    ///
    /// 每页的 entry 数量
    pub const PAGE_SIZE: usize = 1 << PAGE_BITS;

    /// Largest slot count the 32-bit index space allows, in whole pages
    const MAX_CAPACITY: usize = u32::MAX as usize - (Self::PAGE_SIZE - 1);

    /// Create a new empty HandleTable
    ///
    /// No page is allocated until the first `allocate`.
    ///
    /// 创建一个新的空 HandleTable，首次 `allocate` 前不分配页面
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let table: HandleTable = HandleTable::new();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), 0);
    /// ```
    #[inline]
    pub const fn new() -> Self {
        const { assert!(PAGE_BITS >= 1 && PAGE_BITS <= 16, "PAGE_BITS must be in 1..=16") };
        Self {
            pages: PageTree::new(),
            first_free: FREE_LIST_END,
            count: 0,
            limit: Self::MAX_CAPACITY,
        }
    }

    /// Create a HandleTable with at least `capacity` slots already paged in
    ///
    /// 创建一个至少已分页 `capacity` 个 slot 的 HandleTable
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let table: HandleTable<u8> = HandleTable::with_capacity(300).unwrap();
    /// assert_eq!(table.capacity(), 512);
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self, HandleTableError> {
        let mut table = Self::new();
        table.reserve(capacity)?;
        Ok(table)
    }

    /// Create a HandleTable that never grows past `limit` slots
    ///
    /// The limit is rounded down to whole pages and clamped to what the
    /// 32-bit index space can address. Growth beyond it fails with
    /// [`HandleTableError::CapacityExhausted`].
    ///
    /// 创建一个容量不超过 `limit` 个 slot 的 HandleTable
    ///
    /// 上限向下取整到整页，并限制在 32 位索引空间内。
    /// 超出后扩容返回 [`HandleTableError::CapacityExhausted`]。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::{HandleTable, HandleTableError};
    ///
    /// let mut table: HandleTable<u8, 2> = HandleTable::with_capacity_limit(6);
    /// assert_eq!(table.capacity_limit(), 4);
    /// for _ in 0..4 {
    ///     table.allocate().unwrap();
    /// }
    /// assert_eq!(
    ///     table.allocate(),
    ///     Err(HandleTableError::CapacityExhausted { limit: 4 })
    /// );
    /// ```
    pub fn with_capacity_limit(limit: usize) -> Self {
        let mut table = Self::new();
        table.limit = limit.min(Self::MAX_CAPACITY) & !(Self::PAGE_SIZE - 1);
        table
    }

    /// Allocate a slot and return its handle
    ///
    /// The slot starts with a null payload. A page is added when no free
    /// slot is left; if that fails the table is left unchanged.
    ///
    /// 分配一个 slot 并返回其 handle
    ///
    /// slot 的初始负载为空指针。没有空闲 slot 时会添加一页；
    /// 若添加失败，表保持不变。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let handle = table.allocate().unwrap();
    /// assert!(table.get(handle).unwrap().is_null());
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn allocate(&mut self) -> Result<Handle, HandleTableError> {
        if unlikely(self.first_free == FREE_LIST_END) {
            self.grow()?;
        }

        let index = self.first_free;
        let entry = self.pages.entry_mut(index);

        // Pop before marking the entry occupied
        // 在标记占用之前弹出
        self.first_free = entry.next;
        entry.occupy();
        self.count += 1;

        Ok(Handle::encode(index, entry.generation))
    }

    /// Release the slot named by `handle`
    ///
    /// Returns `false` for stale, forged or already released handles.
    /// On success every copy of `handle` becomes permanently invalid.
    ///
    /// 释放 `handle` 指向的 slot
    ///
    /// 对于过期、伪造或已释放的 handle 返回 `false`。
    /// 成功后 `handle` 的所有副本永久失效。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let handle = table.allocate().unwrap();
    /// assert!(table.deallocate(handle));
    /// assert!(!table.deallocate(handle));
    /// ```
    pub fn deallocate(&mut self, handle: Handle) -> bool {
        let Some(index) = self.live_index(handle) else {
            log::trace!("rejected deallocation of stale handle {handle}");
            return false;
        };

        self.release(index);
        true
    }

    /// Release the slot named by `handle` and return its payload
    ///
    /// 释放 `handle` 指向的 slot 并返回其负载
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut value = 7u8;
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let handle = table.allocate().unwrap();
    /// table.set(handle, &mut value);
    ///
    /// assert_eq!(table.remove(handle), Some(&mut value as *mut u8));
    /// assert_eq!(table.remove(handle), None);
    /// ```
    pub fn remove(&mut self, handle: Handle) -> Option<*mut T> {
        let index = self.live_index(handle)?;
        let data = self.pages.entry(index).data;
        self.release(index);
        Some(data)
    }

    /// Get the payload stored under `handle`
    ///
    /// 获取 `handle` 下保存的负载
    ///
    /// # Returns
    /// - `Some(ptr)`: the stored pointer, null if never set
    /// - `None`: if the handle is stale or forged
    ///
    /// # 返回值
    /// - `Some(ptr)`: 保存的指针，未设置时为空指针
    /// - `None`: 如果 handle 已过期或是伪造的
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<*mut T> {
        self.live_index(handle)
            .map(|index| self.pages.entry(index).data)
    }

    /// Store `data` under `handle`, replacing the previous payload
    ///
    /// Returns `false` if the handle is stale or forged.
    ///
    /// 在 `handle` 下保存 `data`，替换之前的负载。handle 无效时返回 `false`。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut a = 1u8;
    /// let mut b = 2u8;
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let handle = table.allocate().unwrap();
    ///
    /// assert!(table.set(handle, &mut a));
    /// assert!(table.set(handle, &mut b));
    /// assert_eq!(table.get(handle), Some(&mut b as *mut u8));
    /// ```
    #[inline]
    pub fn set(&mut self, handle: Handle, data: *mut T) -> bool {
        match self.live_index(handle) {
            Some(index) => {
                self.pages.entry_mut(index).data = data;
                true
            }
            None => false,
        }
    }

    /// Check whether `handle` currently names a live slot
    ///
    /// 检查 `handle` 当前是否指向一个占用的 slot
    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.live_index(handle).is_some()
    }

    /// Return the number of live slots
    ///
    /// 返回占用的 slot 数量
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Check if no slot is live
    ///
    /// 检查是否没有占用的 slot
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Return the number of slots across all allocated pages
    ///
    /// 返回所有已分配页面中的 slot 总数
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pages.capacity()
    }

    /// Return the configured slot limit
    ///
    /// 返回配置的 slot 上限
    #[inline]
    pub fn capacity_limit(&self) -> usize {
        self.limit
    }

    /// Number of mapping page levels above the leaf pages
    ///
    /// 叶子页之上的映射页层数
    #[inline]
    pub fn height(&self) -> u32 {
        self.pages.height()
    }

    /// Page in slots until at least `additional` of them are free
    ///
    /// Existing free slots are kept. A request the capacity limit can never
    /// satisfy fails before any page is added. If a page allocation fails,
    /// pages added before it are kept.
    ///
    /// 增加页面直到至少有 `additional` 个空闲 slot。已有的空闲 slot 会保留。
    /// 容量上限无法满足的请求在添加任何页面之前失败；页面分配失败时，之前添加的页面会保留。
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut table: HandleTable<u8, 4> = HandleTable::new();
    /// table.reserve(40).unwrap();
    /// assert_eq!(table.capacity(), 48);
    /// ```
    pub fn reserve(&mut self, additional: usize) -> Result<(), HandleTableError> {
        if unlikely(additional > self.limit - self.len()) {
            return Err(HandleTableError::CapacityExhausted { limit: self.limit });
        }
        while self.capacity() - self.len() < additional {
            self.grow()?;
        }
        Ok(())
    }

    /// Invalidate every handle and return all slots to the free list
    ///
    /// Pages are kept.
    ///
    /// 使所有 handle 失效并将所有 slot 放回空闲列表，页面保留
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let handle = table.allocate().unwrap();
    ///
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert!(!table.contains(handle));
    /// assert_eq!(table.capacity(), 256);
    /// ```
    pub fn clear(&mut self) {
        let capacity = self.capacity() as u32;
        for (index, entry) in self.pages.entries_mut() {
            let next = if index + 1 < capacity {
                index + 1
            } else {
                FREE_LIST_END
            };
            if entry.is_occupied() {
                entry.vacate(next);
            } else {
                entry.next = next;
            }
            entry.data = ptr::null_mut();
        }
        self.first_free = if capacity == 0 { FREE_LIST_END } else { 0 };
        self.count = 0;
    }

    /// Return an iterator over all (handle, payload) pairs in slot order
    ///
    /// 返回按 slot 顺序遍历所有 (handle, 负载) 对的迭代器
    ///
    /// # Examples (示例)
    ///
    /// ```
    /// use handle_table::HandleTable;
    ///
    /// let mut table: HandleTable<u8> = HandleTable::new();
    /// let h1 = table.allocate().unwrap();
    /// let h2 = table.allocate().unwrap();
    /// table.deallocate(h1);
    ///
    /// let handles: Vec<_> = table.iter().map(|(handle, _)| handle).collect();
    /// assert_eq!(handles, vec![h2]);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = (Handle, *mut T)> + '_ {
        self.pages.entries().filter_map(|(index, entry)| {
            entry
                .is_occupied()
                .then(|| (Handle::encode(index, entry.generation), entry.data))
        })
    }

    /// Index of the live slot `handle` names, if any
    ///
    /// Forged indices beyond capacity are rejected here, before lookup.
    #[inline]
    fn live_index(&self, handle: Handle) -> Option<u32> {
        let (index, generation) = handle.decode();

        if unlikely(index as usize >= self.capacity()) {
            return None;
        }

        let entry: &Entry<T> = self.pages.entry(index);
        if likely(entry.is_live(generation)) {
            Some(index)
        } else {
            None
        }
    }

    /// Push the live slot at `index` onto the free list
    #[inline]
    fn release(&mut self, index: u32) {
        let next = self.first_free;
        self.pages.entry_mut(index).vacate(next);
        self.first_free = index;
        self.count -= 1;
    }

    /// Add one page and push its slots onto the free list
    fn grow(&mut self) -> Result<(), HandleTableError> {
        let capacity = self.capacity();
        if unlikely(self.limit - capacity < Self::PAGE_SIZE) {
            log::warn!(
                "handle table cannot grow past {} slots ({} live)",
                self.limit,
                self.count
            );
            return Err(HandleTableError::CapacityExhausted { limit: self.limit });
        }

        match self.pages.grow(self.first_free) {
            Ok(head) => {
                self.first_free = head;
                log::debug!(
                    "handle table grew to {} slots (height {})",
                    self.capacity(),
                    self.height()
                );
                Ok(())
            }
            Err(err) => {
                log::warn!("handle table page allocation failed at {capacity} slots: {err}");
                Err(err.into())
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_page_alloc(&mut self, nth: usize) {
        self.pages.fail_page_alloc = Some(nth);
    }
}

impl<T, const PAGE_BITS: u32> Default for HandleTable<T, PAGE_BITS> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const PAGE_BITS: u32> fmt::Debug for HandleTable<T, PAGE_BITS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("height", &self.height())
            .finish()
    }
}

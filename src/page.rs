use crate::entry::Entry;
use crate::utils::{GENERATION_STEP, height_for, seed_generation, selector};
use std::collections::TryReserveError;

/// Marks an absent child in a mapping page (and an empty tree's root)
///
/// 标记映射页中不存在的子节点（以及空树的根）
pub(crate) const NO_PAGE: u32 = u32::MAX;

/// Leaf page: `1 << PAGE_BITS` entries
type LeafPage<T> = Vec<Entry<T>>;

/// Mapping page: `1 << PAGE_BITS` child page ids
type MappingPage = Vec<u32>;

/// Paged storage of a HandleTable
///
/// Pages live in two arenas and point at each other by id. A tree of height
/// 0 is a single leaf page; a tree of height N has N levels of mapping pages
/// above the leaves. Slot `index` is reached by descending from the root,
/// taking child `selector(index, level)` at each mapping level and slot
/// `selector(index, 0)` in the leaf.
///
/// Leaf pages are pushed in index order, so leaf id `k` covers slots
/// `k << PAGE_BITS ..` and whole-table scans can walk the leaf arena directly.
///
/// HandleTable 的分页存储
///
/// 页面存放在两个 arena 中，彼此通过 id 引用。高度为 0 的树是单个叶子页；
/// 高度为 N 的树在叶子之上有 N 层映射页。
pub(crate) struct PageTree<T, const PAGE_BITS: u32> {
    leaves: Vec<LeafPage<T>>,
    mappings: Vec<MappingPage>,
    root: u32,
    height: u32,
    /// Fails the n-th upcoming page allocation (0 = the next one)
    #[cfg(test)]
    pub(crate) fail_page_alloc: Option<usize>,
}

impl<T, const PAGE_BITS: u32> PageTree<T, PAGE_BITS> {
    pub(crate) const PAGE_SIZE: usize = 1 << PAGE_BITS;

    pub(crate) const fn new() -> Self {
        Self {
            leaves: Vec::new(),
            mappings: Vec::new(),
            root: NO_PAGE,
            height: 0,
            #[cfg(test)]
            fail_page_alloc: None,
        }
    }

    /// Number of slots backed by leaf pages
    ///
    /// 由叶子页支撑的 slot 数量
    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.leaves.len() << PAGE_BITS
    }

    #[inline(always)]
    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    /// Id of the leaf page holding `index`
    #[inline]
    fn leaf_of(&self, index: u32) -> usize {
        debug_assert!(
            (index as usize) < self.capacity(),
            "slot index {index} out of bounds (capacity {})",
            self.capacity()
        );

        let mut page = self.root;
        for level in (1..=self.height).rev() {
            page = self.mappings[page as usize][selector(index, level, PAGE_BITS)];
        }
        page as usize
    }

    /// Look up the entry at `index`
    ///
    /// `index` must be below `capacity()`.
    ///
    /// 查找 `index` 处的 entry，`index` 必须小于 `capacity()`。
    #[inline]
    pub(crate) fn entry(&self, index: u32) -> &Entry<T> {
        let leaf = self.leaf_of(index);
        &self.leaves[leaf][selector(index, 0, PAGE_BITS)]
    }

    /// Mutable counterpart of [`PageTree::entry`]
    ///
    /// [`PageTree::entry`] 的可变版本
    #[inline]
    pub(crate) fn entry_mut(&mut self, index: u32) -> &mut Entry<T> {
        let leaf = self.leaf_of(index);
        &mut self.leaves[leaf][selector(index, 0, PAGE_BITS)]
    }

    /// All entries with their slot index, in index order
    ///
    /// 按 index 顺序返回所有 entry 及其 slot 索引
    pub(crate) fn entries(&self) -> impl Iterator<Item = (u32, &Entry<T>)> {
        self.leaves.iter().enumerate().flat_map(|(page, leaf)| {
            leaf.iter()
                .enumerate()
                .map(move |(slot, entry)| (((page << PAGE_BITS) | slot) as u32, entry))
        })
    }

    /// Mutable counterpart of [`PageTree::entries`]
    ///
    /// [`PageTree::entries`] 的可变版本
    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (u32, &mut Entry<T>)> {
        self.leaves.iter_mut().enumerate().flat_map(|(page, leaf)| {
            leaf.iter_mut()
                .enumerate()
                .map(move |(slot, entry)| (((page << PAGE_BITS) | slot) as u32, entry))
        })
    }

    /// Append one leaf page behind every existing one
    ///
    /// The new page's slots form a free list whose tail links to `next_free`.
    /// Returns the index of its first slot, the new free-list head.
    ///
    /// All memory is obtained before anything is linked: on error the tree
    /// is exactly as it was.
    ///
    /// 在所有现有叶子页之后追加一个叶子页
    ///
    /// 新页的 slot 组成一个空闲列表，尾部链接到 `next_free`。
    /// 返回第一个 slot 的 index，即新的空闲列表头。
    ///
    /// 所有内存在链接之前获取：出错时树保持原样。
    pub(crate) fn grow(&mut self, next_free: u32) -> Result<u32, TryReserveError> {
        let base = self.capacity() as u32;
        let height = height_for(self.leaves.len() + 1, PAGE_BITS);
        let needed = self.mappings_needed(base, height);

        // Stage: new mapping pages are pushed unlinked and dropped on failure
        // 暂存：新映射页以未链接状态推入，失败时丢弃
        let mark = self.mappings.len();
        let leaf = match self.stage(base, next_free, needed) {
            Ok(leaf) => leaf,
            Err(err) => {
                self.mappings.truncate(mark);
                return Err(err);
            }
        };

        // Link: nothing below allocates
        // 链接：以下操作不会分配内存
        let leaf_id = self.leaves.len() as u32;
        debug_assert_eq!(leaf_id as usize, (base as usize) >> PAGE_BITS);
        self.leaves.push(leaf);

        if self.root == NO_PAGE {
            debug_assert_eq!(height, 0);
            self.root = leaf_id;
            return Ok(base);
        }

        let mut fresh = mark as u32;
        while self.height < height {
            self.mappings[fresh as usize][0] = self.root;
            self.root = fresh;
            self.height += 1;
            fresh += 1;
            log::debug!("handle table height raised to {}", self.height);
        }

        let mut page = self.root;
        for level in (2..=self.height).rev() {
            let sel = selector(base, level, PAGE_BITS);
            let mut child = self.mappings[page as usize][sel];
            if child == NO_PAGE {
                child = fresh;
                fresh += 1;
                self.mappings[page as usize][sel] = child;
            }
            page = child;
        }
        self.mappings[page as usize][selector(base, 1, PAGE_BITS)] = leaf_id;
        debug_assert_eq!(fresh as usize, self.mappings.len());

        Ok(base)
    }

    /// Count the mapping pages a leaf attached at `base` needs at `height`
    fn mappings_needed(&self, base: u32, height: u32) -> usize {
        if self.root == NO_PAGE {
            return 0;
        }
        // Wrapping only happens when the root is full: the new root and every
        // level below it on the path to `base` are fresh.
        // 仅当根已满时才包裹：新根及其下通往 `base` 路径上的每一层都是新的。
        if height > self.height {
            return height as usize;
        }
        let mut page = self.root;
        for level in (2..=height).rev() {
            let child = self.mappings[page as usize][selector(base, level, PAGE_BITS)];
            if child == NO_PAGE {
                return (level - 1) as usize;
            }
            page = child;
        }
        0
    }

    /// Obtain every allocation a growth step needs
    fn stage(
        &mut self,
        base: u32,
        next_free: u32,
        needed: usize,
    ) -> Result<LeafPage<T>, TryReserveError> {
        self.mappings.try_reserve(needed)?;
        for _ in 0..needed {
            let mut page = MappingPage::new();
            self.reserve_page(&mut page)?;
            page.resize(Self::PAGE_SIZE, NO_PAGE);
            self.mappings.push(page);
        }
        self.leaves.try_reserve(1)?;

        let mut leaf = LeafPage::new();
        self.reserve_page(&mut leaf)?;
        let last = Self::PAGE_SIZE as u32 - 1;
        let mut generation = seed_generation(leaf.as_ptr().addr());
        for slot in 0..=last {
            let next = if slot < last { base + slot + 1 } else { next_free };
            leaf.push(Entry::vacant(next, generation));
            generation = generation.wrapping_mul(GENERATION_STEP);
        }
        Ok(leaf)
    }

    /// Reserve room for one page's worth of elements in `page`
    fn reserve_page<E>(&mut self, page: &mut Vec<E>) -> Result<(), TryReserveError> {
        if self.take_injected_failure() {
            // Requesting usize::MAX bytes always overflows
            return Vec::<u8>::new().try_reserve(usize::MAX);
        }
        page.try_reserve_exact(Self::PAGE_SIZE)
    }

    #[cfg(test)]
    fn take_injected_failure(&mut self) -> bool {
        match self.fail_page_alloc {
            Some(0) => {
                self.fail_page_alloc = None;
                true
            }
            Some(countdown) => {
                self.fail_page_alloc = Some(countdown - 1);
                false
            }
            None => false,
        }
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn take_injected_failure(&mut self) -> bool {
        false
    }
}

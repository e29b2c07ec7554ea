use std::fmt;
use std::ptr;

/// `next` value of an occupied entry
///
/// 占用状态 entry 的 `next` 值
pub(crate) const OCCUPIED: u32 = u32::MAX;

/// `next` value of the last entry on the free list (and of an empty list head)
///
/// 空闲列表最后一个 entry 的 `next` 值（也用于空列表头）
pub(crate) const FREE_LIST_END: u32 = u32::MAX - 1;

/// One slot of a leaf page
///
/// While free, `next` links to the next free slot. While occupied, `next`
/// holds [`OCCUPIED`] and `data` holds the caller's payload, which the table
/// never dereferences.
///
/// 叶子页中的一个 slot
///
/// 空闲时 `next` 链接到下一个空闲 slot；占用时 `next` 为 [`OCCUPIED`]，
/// `data` 保存调用者的负载，表本身从不解引用它。
pub(crate) struct Entry<T> {
    pub(crate) data: *mut T,
    pub(crate) next: u32,
    pub(crate) generation: u32, // Bumped on every occupied -> free | 每次 占用 -> 空闲 时递增
}

impl<T> Entry<T> {
    /// A free entry linked to `next`
    ///
    /// 链接到 `next` 的空闲 entry
    #[inline(always)]
    pub(crate) fn vacant(next: u32, generation: u32) -> Self {
        Self {
            data: ptr::null_mut(),
            next,
            generation,
        }
    }

    #[inline(always)]
    pub(crate) fn is_occupied(&self) -> bool {
        self.next == OCCUPIED
    }

    /// Whether a handle carrying `generation` refers to this entry right now
    ///
    /// handle 携带的 `generation` 当前是否指向此 entry
    #[inline(always)]
    pub(crate) fn is_live(&self, generation: u32) -> bool {
        self.generation == generation && self.is_occupied()
    }

    /// Transition: free -> occupied
    ///
    /// 状态转换：空闲 -> 占用
    #[inline(always)]
    pub(crate) fn occupy(&mut self) {
        debug_assert!(!self.is_occupied(), "occupying a live entry");
        self.next = OCCUPIED;
        self.data = ptr::null_mut();
    }

    /// Transition: occupied -> free (next generation), linked to `next`
    ///
    /// Generations wrap; a handle kept across 2^32 reuses of one slot would
    /// validate again.
    ///
    /// 状态转换：占用 -> 空闲（下一代），链接到 `next`
    #[inline(always)]
    pub(crate) fn vacate(&mut self, next: u32) {
        debug_assert!(self.is_occupied(), "vacating a free entry");
        self.generation = self.generation.wrapping_add(1);
        self.next = next;
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = fmt.debug_struct("Entry");
        builder.field("generation", &self.generation);
        if self.is_occupied() {
            builder.field("data", &self.data).finish()
        } else if self.next == FREE_LIST_END {
            builder.field("next", &"end").finish()
        } else {
            builder.field("next", &self.next).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_transitions() {
        let mut entry: Entry<u8> = Entry::vacant(FREE_LIST_END, 7);
        assert!(!entry.is_occupied());
        assert!(!entry.is_live(7));

        entry.occupy();
        assert!(entry.is_live(7));
        assert!(!entry.is_live(8));
        assert!(entry.data.is_null());

        entry.vacate(3);
        assert_eq!(entry.generation, 8);
        assert_eq!(entry.next, 3);
        assert!(!entry.is_live(7));
        assert!(!entry.is_live(8));
    }

    #[test]
    fn test_generation_wraps() {
        let mut entry: Entry<u8> = Entry::vacant(FREE_LIST_END, u32::MAX);
        entry.occupy();
        entry.vacate(FREE_LIST_END);
        assert_eq!(entry.generation, 0);
    }

    #[test]
    fn test_free_list_tail_is_not_occupied() {
        // The tail of the free list must not look like a live entry
        // 空闲列表尾部不能被当作占用的 entry
        let entry: Entry<u8> = Entry::vacant(FREE_LIST_END, 0);
        assert!(!entry.is_live(0));
        assert_ne!(FREE_LIST_END, OCCUPIED);
    }
}

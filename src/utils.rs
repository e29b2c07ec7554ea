/// Branch prediction hint: marks code path as unlikely (cold)
///
/// 分支预测提示：标记代码路径为冷路径
#[inline(always)]
#[cold]
pub(crate) fn cold() {}

/// Branch prediction hint: the condition is expected to hold
///
/// 分支预测提示：条件很可能为真
#[inline(always)]
pub(crate) fn likely(b: bool) -> bool {
    if !b {
        cold();
    }
    b
}

/// Branch prediction hint: the condition is expected not to hold
///
/// 分支预测提示：条件很可能为假
#[inline(always)]
pub(crate) fn unlikely(b: bool) -> bool {
    if b {
        cold();
    }
    b
}

/// Odd multiplier stepping the seeded generation from one slot to the next
///
/// 从一个 slot 到下一个 slot 推进初始代数的奇数乘子
pub(crate) const GENERATION_STEP: u32 = 0x9E37_79B1;

/// Child selector of `index` inside a mapping page at `level`
///
/// Level 0 selects the slot inside a leaf page.
///
/// `index` 在第 `level` 层映射页中的子节点选择器
///
/// 第 0 层选择叶子页内的 slot。
#[inline(always)]
pub(crate) fn selector(index: u32, level: u32, page_bits: u32) -> usize {
    let mask = (1u64 << page_bits) - 1;
    (((index as u64) >> (page_bits * level)) & mask) as usize
}

/// Number of mapping levels needed to reach `leaf_count` leaf pages
///
/// 覆盖 `leaf_count` 个叶子页所需的映射层数
#[inline]
pub(crate) fn height_for(leaf_count: usize, page_bits: u32) -> u32 {
    let mut height = 0;
    let mut span: u64 = 1;
    while span < leaf_count as u64 {
        span <<= page_bits;
        height += 1;
    }
    height
}

/// Initial generation for the first slot of a freshly allocated leaf page
///
/// Folds the page address into 32 bits. Only meant to keep generations from
/// starting at the same value on every page; nothing relies on it.
///
/// 新分配叶子页第一个 slot 的初始代数
///
/// 将页面地址折叠为 32 位，仅用于避免每个页面的代数都从同一值开始。
#[inline]
pub(crate) fn seed_generation(addr: usize) -> u32 {
    let addr = addr as u64;
    ((addr >> 32) as u32) ^ (addr as u32)
}

#[cfg(test)]
mod utils_tests {
    use super::*;

    #[test]
    fn test_selector_levels() {
        // page_bits = 8: index 0x0001_0203 -> level 0 = 0x03, level 1 = 0x02, level 2 = 0x01
        assert_eq!(selector(0x0001_0203, 0, 8), 0x03);
        assert_eq!(selector(0x0001_0203, 1, 8), 0x02);
        assert_eq!(selector(0x0001_0203, 2, 8), 0x01);
        assert_eq!(selector(0x0001_0203, 3, 8), 0x00);
        assert_eq!(selector(u32::MAX, 4, 8), 0x00);
    }

    #[test]
    fn test_height_for() {
        assert_eq!(height_for(0, 8), 0);
        assert_eq!(height_for(1, 8), 0);
        assert_eq!(height_for(2, 8), 1);
        assert_eq!(height_for(256, 8), 1);
        assert_eq!(height_for(257, 8), 2);
        assert_eq!(height_for(5, 2), 2);
        assert_eq!(height_for(17, 2), 3);
    }

    #[test]
    fn test_seed_generation_folds_halves() {
        assert_eq!(seed_generation(0x1234), 0x1234);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(seed_generation(0x0000_0001_0000_0001), 0);
    }
}

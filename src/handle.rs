use std::fmt;

/// Fixed key XORed over the packed (index, generation) word
///
/// Obfuscation only: it keeps the bit layout out of the public contract and
/// stops callers from forging neighbours by incrementing an observed value.
/// It is not a security boundary.
///
/// 与打包后的 (index, generation) 字异或的固定密钥
///
/// 仅用于混淆，不是安全边界。
const OBFUSCATION_KEY: u64 = 0x7f94_a11a_b7b3_ee6b;

/// Opaque reference to a slot of a HandleTable
///
/// A handle is a plain 64-bit value. It stays valid until the slot it names
/// is deallocated; afterwards every lookup with it fails, even once the slot
/// is reused.
///
/// HandleTable 中某个 slot 的不透明引用
///
/// handle 是一个普通的 64 位值。在对应 slot 被释放之前一直有效；
/// 释放后即使 slot 被复用，使用它的查询也都会失败。
///
/// # Examples (示例)
///
/// ```
/// use handle_table::{Handle, HandleTable};
///
/// let mut table: HandleTable<u32> = HandleTable::new();
/// let handle = table.allocate().unwrap();
///
/// // Hand the raw value to external code and take it back later
/// // 将原始值交给外部代码，之后再取回
/// let raw = handle.to_raw();
/// assert_eq!(Handle::from_raw(raw), handle);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Pack index (low 32 bits) and generation (high 32 bits), then obfuscate
    ///
    /// 打包 index（低 32 位）和 generation（高 32 位），然后混淆
    #[inline(always)]
    pub(crate) fn encode(index: u32, generation: u32) -> Self {
        Self((((generation as u64) << 32) | (index as u64)) ^ OBFUSCATION_KEY)
    }

    /// Decode into (index, generation)
    ///
    /// 解码为 (index, generation)
    #[inline(always)]
    pub(crate) fn decode(self) -> (u32, u32) {
        let packed = self.0 ^ OBFUSCATION_KEY;
        (packed as u32, (packed >> 32) as u32)
    }

    /// Rebuild a handle from the value returned by [`Handle::to_raw`]
    ///
    /// Any value is accepted; validity is checked by the table on use.
    ///
    /// 从 [`Handle::to_raw`] 返回的值重建 handle
    ///
    /// 接受任意值，有效性在使用时由表检查。
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The opaque 64-bit value of this handle
    ///
    /// 此 handle 的不透明 64 位值
    #[inline(always)]
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl From<Handle> for u64 {
    #[inline(always)]
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

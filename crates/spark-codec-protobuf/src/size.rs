use crate::wire::{varint_len, zigzag32, zigzag64};

/// `SizeCalculator` 描述“类型化值 → 线格式字节数”的纯函数集合。
///
/// # 设计背景（Why）
/// - 长度遍历与编码遍历必须对同一状态给出完全一致的字节数，否则长度前缀会失真；
///   将全部变长计算集中在一个契约上，消息与扩展表共用同一来源。
/// - 以 trait 而非具体类型暴露，测试可以替换为记录型或脚本型实现（参见 [`crate::test_stubs`]），
///   而无需改动消息逻辑。
///
/// # 契约说明（What）
/// - 所有方法对合法输入均无副作用、不失败，且结果只依赖参数；
/// - 定长类型（fixed32/sfixed32/float 为 4 字节，fixed64/sfixed64/double 为 8 字节，bool 为 1 字节）
///   不经过本契约；
/// - 普通有符号字段（int32/int64/enum）为负时，调用方须先符号扩展到 64 位再调用
///   [`compute_varint_size`](Self::compute_varint_size)，因此负的 int32 恒占 10 字节。
pub trait SizeCalculator {
    /// 对 `value` 做 base-128 编码所需的最少字节数（1..=10）。
    fn compute_varint_size(&self, value: u64) -> u64;

    /// 先做 32 位 zigzag 映射，再计算 varint 长度。
    fn compute_zigzag32_size(&self, value: i32) -> u64;

    /// 先做 64 位 zigzag 映射，再计算 varint 长度。
    fn compute_zigzag64_size(&self, value: i64) -> u64;

    /// UTF-8 字节长度加上其 varint 长度前缀。
    fn compute_string_size(&self, value: &str) -> u64;

    /// 原始字节长度加上其 varint 长度前缀。
    fn compute_byte_stream_size(&self, value: &[u8]) -> u64;
}

/// 标准二进制线格式的无状态实现。
///
/// 零尺寸且 `Send + Sync`，可通过 [`BinarySizeCalculator::shared`] 作为进程级单例复用。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BinarySizeCalculator;

static SHARED_CALCULATOR: BinarySizeCalculator = BinarySizeCalculator;

impl BinarySizeCalculator {
    /// 返回进程级共享实例。
    pub fn shared() -> &'static BinarySizeCalculator {
        &SHARED_CALCULATOR
    }
}

impl SizeCalculator for BinarySizeCalculator {
    #[inline]
    fn compute_varint_size(&self, value: u64) -> u64 {
        varint_len(value)
    }

    #[inline]
    fn compute_zigzag32_size(&self, value: i32) -> u64 {
        varint_len(u64::from(zigzag32(value)))
    }

    #[inline]
    fn compute_zigzag64_size(&self, value: i64) -> u64 {
        varint_len(zigzag64(value))
    }

    #[inline]
    fn compute_string_size(&self, value: &str) -> u64 {
        self.compute_byte_stream_size(value.as_bytes())
    }

    #[inline]
    fn compute_byte_stream_size(&self, value: &[u8]) -> u64 {
        let len = value.len() as u64;
        varint_len(len) + len
    }
}

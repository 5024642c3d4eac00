//! 线格式原语：wire type、tag、varint 与 zigzag。
//!
//! 字节布局：
//! - tag = varint((field_number << 3) | wire_type)
//! - varint = 小端 base-128 分组，除最后一个字节外最高位均为续位标记
//! - zigzag(n) = (n << 1) ^ (n >> (bits - 1))
//! - length-delimited = varint(len) 后紧跟 len 个原始字节

use core::fmt;

/// 字段号上限（29 bit）。
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// 实现保留的字段号区间，任何描述符或扩展都不得使用。
pub const RESERVED_FIELD_NUMBERS: core::ops::RangeInclusive<u32> = 19_000..=19_999;

/// 单个 varint 的最大字节数。
pub const MAX_VARINT_LEN: usize = 10;

/// tag 低 3 bit 所标识的字节布局。
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// 变长整数。
    Varint = 0,
    /// 8 字节小端定长。
    Fixed64 = 1,
    /// varint 长度前缀 + 原始字节。
    LengthDelimited = 2,
    /// 4 字节小端定长。
    Fixed32 = 5,
}

impl WireType {
    /// 返回 tag 中使用的 3 bit 数值。
    #[inline(always)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// 判断字段号是否可以出现在线格式中。
#[inline]
pub const fn is_valid_field_number(number: u32) -> bool {
    number >= 1
        && number <= MAX_FIELD_NUMBER
        && !(number >= *RESERVED_FIELD_NUMBERS.start() && number <= *RESERVED_FIELD_NUMBERS.end())
}

/// 组合 tag 数值：`(number << 3) | wire_type`。
#[inline(always)]
pub const fn make_tag(number: u32, wire_type: WireType) -> u64 {
    ((number as u64) << 3) | wire_type.as_u8() as u64
}

/// 对 `value` 做 base-128 编码所需的最少字节数（1..=10）。
#[inline(always)]
pub const fn varint_len(value: u64) -> u64 {
    // 每 7 bit 一组，0 也需要一个字节。
    let bits = 64 - (value | 1).leading_zeros() as u64;
    bits.div_ceil(7)
}

/// tag 所占字节数。
///
/// 生成代码中 tag 长度是编译期常量，因此这里不经过 [`crate::SizeCalculator`]。
#[inline(always)]
pub const fn tag_size(number: u32, wire_type: WireType) -> u64 {
    varint_len(make_tag(number, wire_type))
}

/// 32 位 zigzag 映射。
#[inline(always)]
pub const fn zigzag32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// 64 位 zigzag 映射。
#[inline(always)]
pub const fn zigzag64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// [`zigzag32`] 的逆映射。
#[inline(always)]
pub const fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// [`zigzag64`] 的逆映射。
#[inline(always)]
pub const fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// 将 `value` 以 varint 形式写入栈上缓冲，返回有效字节切片。
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> &[u8] {
    let mut pos = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf[pos] = byte;
            pos += 1;
            break;
        }
        buf[pos] = byte | 0x80;
        pos += 1;
    }
    &buf[..pos]
}

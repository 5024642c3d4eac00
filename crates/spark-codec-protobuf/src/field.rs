//! 单字段的长度与编码算法。
//!
//! 消息自身字段与扩展字段共用本模块，保证两条路径对同一状态给出相同的字节数：
//! 长度遍历只做加法，编码遍历按相同分支逐字节写出。

use std::sync::Arc;

use crate::context::{ComputeSizeContext, InstanceId};
use crate::error::{Result, WireError};
use crate::message::Message;
use crate::options::DefaultValuePolicy;
use crate::sink::CountingSink;
use crate::size::SizeCalculator;
use crate::value::{ScalarKind, Value};
use crate::wire::{WireType, tag_size, zigzag32, zigzag64};

/// 字段槽：存在即代表“已设置”，与值是否为零无关。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldSlot {
    Single(Value),
    Repeated(Vec<Value>),
}

/// 字段的线格式布局参数。
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldLayout {
    pub number: u32,
    pub kind: ScalarKind,
    pub packed: bool,
}

/// 单值字段在当前策略下是否省略。
fn omitted(ctx: &dyn ComputeSizeContext, value: &Value) -> bool {
    ctx.options().default_values == DefaultValuePolicy::OmitDefaults && value.is_default()
}

/// 子消息长度：优先取本趟缓存，未命中时递归计算并写回缓存。
pub(crate) fn message_size(ctx: &dyn ComputeSizeContext, message: &Arc<dyn Message>) -> Result<u64> {
    let id = InstanceId::of(&**message);
    if let Some(size) = ctx.cached_size(id) {
        return Ok(size);
    }
    let size = message.serialized_size(ctx)?;
    ctx.record_size(id, size);
    Ok(size)
}

/// 值本身（不含 tag）的字节数。
///
/// 普通有符号整数先符号扩展到 64 位；定长种类不调用计算器；
/// 子消息为 `varint(S) + S`。
pub(crate) fn value_size(
    calc: &dyn SizeCalculator,
    ctx: &dyn ComputeSizeContext,
    value: &Value,
) -> Result<u64> {
    Ok(match value {
        Value::Bool(_) => 1,
        Value::Int32(v) | Value::Enum(v) => calc.compute_varint_size(i64::from(*v) as u64),
        Value::Int64(v) => calc.compute_varint_size(*v as u64),
        Value::Uint32(v) => calc.compute_varint_size(u64::from(*v)),
        Value::Uint64(v) => calc.compute_varint_size(*v),
        Value::Sint32(v) => calc.compute_zigzag32_size(*v),
        Value::Sint64(v) => calc.compute_zigzag64_size(*v),
        Value::Fixed32(_) | Value::Sfixed32(_) | Value::Float(_) => 4,
        Value::Fixed64(_) | Value::Sfixed64(_) | Value::Double(_) => 8,
        Value::String(v) => calc.compute_string_size(v),
        Value::Bytes(v) => calc.compute_byte_stream_size(v),
        Value::Message(m) => {
            let size = message_size(ctx, m)?;
            calc.compute_varint_size(size) + size
        }
    })
}

/// 字段槽（含 tag）的字节数。
pub(crate) fn slot_size(
    calc: &dyn SizeCalculator,
    ctx: &dyn ComputeSizeContext,
    layout: FieldLayout,
    slot: &FieldSlot,
) -> Result<u64> {
    match slot {
        FieldSlot::Single(value) => {
            if omitted(ctx, value) {
                return Ok(0);
            }
            Ok(tag_size(layout.number, layout.kind.wire_type()) + value_size(calc, ctx, value)?)
        }
        FieldSlot::Repeated(values) if values.is_empty() => Ok(0),
        FieldSlot::Repeated(values) if layout.packed => {
            let payload = packed_payload_size(calc, ctx, values)?;
            Ok(tag_size(layout.number, WireType::LengthDelimited)
                + calc.compute_varint_size(payload)
                + payload)
        }
        FieldSlot::Repeated(values) => {
            let tag = tag_size(layout.number, layout.kind.wire_type());
            let mut total = 0;
            for value in values {
                total += tag + value_size(calc, ctx, value)?;
            }
            Ok(total)
        }
    }
}

fn packed_payload_size(
    calc: &dyn SizeCalculator,
    ctx: &dyn ComputeSizeContext,
    values: &[Value],
) -> Result<u64> {
    let mut payload = 0;
    for value in values {
        payload += value_size(calc, ctx, value)?;
    }
    Ok(payload)
}

/// 按与 [`slot_size`] 相同的分支写出字段槽。
pub(crate) fn encode_slot(
    ctx: &dyn ComputeSizeContext,
    out: &mut CountingSink<'_>,
    layout: FieldLayout,
    slot: &FieldSlot,
) -> Result<()> {
    match slot {
        FieldSlot::Single(value) => {
            if omitted(ctx, value) {
                return Ok(());
            }
            out.put_tag(layout.number, layout.kind.wire_type())?;
            encode_value(ctx, out, value)
        }
        FieldSlot::Repeated(values) if values.is_empty() => Ok(()),
        FieldSlot::Repeated(values) if layout.packed => {
            let payload = packed_payload_size(ctx.size_calculator(), ctx, values)?;
            out.put_tag(layout.number, WireType::LengthDelimited)?;
            out.put_varint(payload)?;
            for value in values {
                encode_value(ctx, out, value)?;
            }
            Ok(())
        }
        FieldSlot::Repeated(values) => {
            for value in values {
                out.put_tag(layout.number, layout.kind.wire_type())?;
                encode_value(ctx, out, value)?;
            }
            Ok(())
        }
    }
}

/// 写出值本身（不含 tag）。
pub(crate) fn encode_value(
    ctx: &dyn ComputeSizeContext,
    out: &mut CountingSink<'_>,
    value: &Value,
) -> Result<()> {
    match value {
        Value::Bool(v) => out.put_varint(u64::from(*v)),
        Value::Int32(v) | Value::Enum(v) => out.put_varint(i64::from(*v) as u64),
        Value::Int64(v) => out.put_varint(*v as u64),
        Value::Uint32(v) => out.put_varint(u64::from(*v)),
        Value::Uint64(v) => out.put_varint(*v),
        Value::Sint32(v) => out.put_varint(u64::from(zigzag32(*v))),
        Value::Sint64(v) => out.put_varint(zigzag64(*v)),
        Value::Fixed32(v) => out.put_fixed32(*v),
        Value::Fixed64(v) => out.put_fixed64(*v),
        Value::Sfixed32(v) => out.put_fixed32(*v as u32),
        Value::Sfixed64(v) => out.put_fixed64(*v as u64),
        Value::Float(v) => out.put_fixed32(v.to_bits()),
        Value::Double(v) => out.put_fixed64(v.to_bits()),
        Value::String(v) => out.put_length_delimited(v.as_bytes()),
        Value::Bytes(v) => out.put_length_delimited(v),
        Value::Message(m) => encode_nested(ctx, out, m),
    }
}

/// 写出长度前缀与子消息，并校验子消息实际写出的字节数与前缀一致。
fn encode_nested(
    ctx: &dyn ComputeSizeContext,
    out: &mut CountingSink<'_>,
    message: &Arc<dyn Message>,
) -> Result<()> {
    let expected = message_size(ctx, message)?;
    out.put_varint(expected)?;
    let mut nested = CountingSink::new(out);
    message.encode(ctx, &mut nested)?;
    check_length(message.message_name(), expected, nested.written())
}

/// 长度不一致属于程序缺陷，记录后以错误终止整趟编码。
pub(crate) fn check_length(message: &str, expected: u64, actual: u64) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    tracing::error!(
        message_name = message,
        expected,
        actual,
        "encoded length diverged from computed size"
    );
    Err(WireError::EncodeLengthMismatch {
        message: message.to_owned(),
        expected,
        actual,
    })
}

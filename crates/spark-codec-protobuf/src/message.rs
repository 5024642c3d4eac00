use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::{ComputeSizeContext, InstanceId, NestingGuard, SizeContext};
use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::error::{Result, WireError};
use crate::extension::ExtensionFieldMap;
use crate::field::{FieldLayout, FieldSlot, check_length, encode_slot, slot_size};
use crate::options::WireOptions;
use crate::sink::{CountingSink, WireSink};
use crate::value::Value;

/// `Message` 是可被计算长度并编码的消息能力契约。
///
/// # 设计背景（Why）
/// - 生成代码、动态消息与测试替身需要共用同一条长度/编码链路，
///   因此父消息只通过该 trait 看见子消息，不关心其具体类型；
/// - 先算长度再编码：length-delimited 子消息的长度前缀必须在写出其内容之前确定。
///
/// # 契约说明（What）
/// - `serialized_size`：返回 `encode` 在相同状态下将写出的确切字节数，不含外层 tag 与长度前缀；
///   每次调用仅向上下文获取一次 [`SizeCalculator`](crate::size::SizeCalculator)；
/// - `encode`：按字段号升序写出，写出字节数必须等于 `serialized_size`；
/// - 两个方法都应以 [`NestingGuard`] 包裹遍历，使上下文能识别环与超深嵌套。
///
/// # 风险提示（Trade-offs）
/// - 实现者若让两个方法的分支不一致，编码路径会以 `EncodeLengthMismatch` 终止，而不是写出畸形帧。
pub trait Message: Send + Sync {
    /// 消息的 schema 名称，用于日志与错误。
    fn message_name(&self) -> &str;

    /// 计算消息体的字节数。
    fn serialized_size(&self, ctx: &dyn ComputeSizeContext) -> Result<u64>;

    /// 将消息体写入 `sink`。
    fn encode(&self, ctx: &dyn ComputeSizeContext, sink: &mut dyn WireSink) -> Result<()>;
}

/// 由 [`MessageDescriptor`] 驱动的动态消息。
///
/// 字段存在性是显式的：槽位存在即为“已设置”，即便值为零值；
/// 是否写出零值由 [`WireOptions::default_values`] 决定。
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    slots: BTreeMap<u32, FieldSlot>,
    extensions: Option<ExtensionFieldMap>,
}

impl DynamicMessage {
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            slots: BTreeMap::new(),
            extensions: None,
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// 设置单值字段。
    ///
    /// 字段未声明返回 `UnknownField`；字段为重复字段返回 `CardinalityMismatch`；
    /// 值的种类与声明不符返回 `ValueRange`。
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = self.declared(number, false)?;
        check_kind(field, &value)?;
        self.slots.insert(number, FieldSlot::Single(value));
        Ok(())
    }

    /// 以 `i64` 设置整数字段，按声明种类做范围检查。
    pub fn set_i64(&mut self, number: u32, value: i64) -> Result<()> {
        let field = self.declared(number, false)?;
        let value = Value::coerce_i64(field.kind(), value).map_err(|detail| WireError::ValueRange {
            field: number,
            kind: field.kind(),
            detail,
        })?;
        self.slots.insert(number, FieldSlot::Single(value));
        Ok(())
    }

    /// 以 `u64` 设置整数字段，按声明种类做范围检查。
    pub fn set_u64(&mut self, number: u32, value: u64) -> Result<()> {
        let field = self.declared(number, false)?;
        let value = Value::coerce_u64(field.kind(), value).map_err(|detail| WireError::ValueRange {
            field: number,
            kind: field.kind(),
            detail,
        })?;
        self.slots.insert(number, FieldSlot::Single(value));
        Ok(())
    }

    /// 向重复字段追加元素。
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field = self.declared(number, true)?;
        check_kind(field, &value)?;
        let slot = self
            .slots
            .entry(number)
            .or_insert_with(|| FieldSlot::Repeated(Vec::new()));
        if let FieldSlot::Repeated(values) = slot {
            values.push(value);
        }
        Ok(())
    }

    /// 清除字段，返回其此前是否已设置。
    pub fn clear(&mut self, number: u32) -> bool {
        self.slots.remove(&number).is_some()
    }

    /// 字段是否已设置；重复字段追加过元素即视为已设置。
    pub fn has(&self, number: u32) -> bool {
        self.slots.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&Value> {
        match self.slots.get(&number) {
            Some(FieldSlot::Single(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_repeated(&self, number: u32) -> &[Value] {
        match self.slots.get(&number) {
            Some(FieldSlot::Repeated(values)) => values,
            _ => &[],
        }
    }

    pub fn extensions(&self) -> Option<&ExtensionFieldMap> {
        self.extensions.as_ref()
    }

    /// 取扩展表，首次访问时创建。
    pub fn extensions_mut(&mut self) -> &mut ExtensionFieldMap {
        let owner = &self.descriptor;
        self.extensions
            .get_or_insert_with(|| ExtensionFieldMap::for_descriptor(Arc::clone(owner)))
    }

    /// 挂载预先构建的扩展表；与本消息字段号冲突时拒绝。
    ///
    /// 扩展表可能为其他描述符构建，挂载后其归属改为本消息，
    /// 后续经 [`extensions_mut`](Self::extensions_mut) 的插入同样受本消息字段号约束。
    pub fn set_extensions(&mut self, extensions: ExtensionFieldMap) -> Result<()> {
        let extensions = extensions.adopt(Arc::clone(&self.descriptor))?;
        self.extensions = Some(extensions);
        Ok(())
    }

    fn declared(&self, number: u32, repeated: bool) -> Result<&FieldDescriptor> {
        let field = self
            .descriptor
            .field(number)
            .ok_or_else(|| WireError::UnknownField {
                message: self.descriptor.name().to_owned(),
                field: number,
            })?;
        if field.is_repeated() != repeated {
            return Err(WireError::CardinalityMismatch {
                field: number,
                expected: field.cardinality().as_str(),
                actual: if repeated { "repeated" } else { "singular" },
            });
        }
        Ok(field)
    }

    /// 已设置字段与其布局，按字段号升序。
    fn present(&self) -> impl Iterator<Item = (FieldLayout, &FieldSlot)> + '_ {
        self.descriptor.fields().iter().filter_map(|field| {
            let slot = self.slots.get(&field.number())?;
            let layout = FieldLayout {
                number: field.number(),
                kind: field.kind(),
                packed: field.is_packed(),
            };
            Some((layout, slot))
        })
    }
}

fn check_kind(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if value.kind() == field.kind() {
        return Ok(());
    }
    Err(WireError::ValueRange {
        field: field.number(),
        kind: field.kind(),
        detail: format!("`{}` value for a `{}` field", value.kind(), field.kind()),
    })
}

impl Message for DynamicMessage {
    fn message_name(&self) -> &str {
        self.descriptor.name()
    }

    fn serialized_size(&self, ctx: &dyn ComputeSizeContext) -> Result<u64> {
        let _guard = NestingGuard::enter(ctx, InstanceId::of(self), self.message_name())?;
        let calc = ctx.size_calculator();
        let mut total = 0;
        for (layout, slot) in self.present() {
            total += slot_size(calc, ctx, layout, slot)?;
        }
        if let Some(extensions) = &self.extensions {
            total += extensions.size_with(calc, ctx)?;
        }
        Ok(total)
    }

    fn encode(&self, ctx: &dyn ComputeSizeContext, sink: &mut dyn WireSink) -> Result<()> {
        let _guard = NestingGuard::enter(ctx, InstanceId::of(self), self.message_name())?;
        let mut out = CountingSink::new(sink);
        for (layout, slot) in self.present() {
            encode_slot(ctx, &mut out, layout, slot)?;
        }
        if let Some(extensions) = &self.extensions {
            extensions.encode_into(ctx, &mut out)?;
        }
        Ok(())
    }
}

/// 在新建的 [`SizeContext`] 中计算消息长度。
pub fn serialized_size_of(message: &dyn Message, options: WireOptions) -> Result<u64> {
    let ctx = SizeContext::with_options(options);
    let size = message.serialized_size(&ctx)?;
    tracing::debug!(
        message_name = message.message_name(),
        size,
        "computed serialized size"
    );
    Ok(size)
}

/// 编码为新分配的缓冲区；任何错误都会丢弃已写出的部分。
pub fn serialize_to_vec(message: &dyn Message, options: WireOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    serialize_into(message, options, &mut buf)?;
    Ok(buf)
}

/// 先计算长度再编码到 `sink`，返回写出的字节数。
///
/// # 契约说明（What）
/// - 长度遍历与编码遍历共享同一个上下文，子消息长度只计算一次；
/// - 环与超深嵌套在长度遍历中即被识别，此时 `sink` 未被写入任何字节；
/// - 写出字节数与计算长度不一致时返回 `EncodeLengthMismatch`，此前写出的字节由调用方丢弃。
pub fn serialize_into(
    message: &dyn Message,
    options: WireOptions,
    sink: &mut dyn WireSink,
) -> Result<u64> {
    let ctx = SizeContext::with_options(options);
    let expected = message.serialized_size(&ctx)?;
    let mut out = CountingSink::new(sink);
    message.encode(&ctx, &mut out)?;
    let written = out.written();
    check_length(message.message_name(), expected, written)?;
    tracing::debug!(
        message_name = message.message_name(),
        size = expected,
        written,
        "encoded message"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DefaultValuePolicy;
    use crate::value::ScalarKind;

    fn person() -> Arc<MessageDescriptor> {
        MessageDescriptor::builder("Person")
            .field(FieldDescriptor::singular(1, "name", ScalarKind::String))
            .field(FieldDescriptor::singular(2, "id", ScalarKind::Int32))
            .field(FieldDescriptor::singular(3, "email", ScalarKind::String))
            .field(FieldDescriptor::repeated(4, "phones", ScalarKind::Uint32))
            .build()
            .unwrap()
    }

    #[test]
    fn accessors_validate_against_descriptor() {
        let mut msg = DynamicMessage::new(person());
        assert!(matches!(
            msg.set(9, true),
            Err(WireError::UnknownField { field: 9, .. })
        ));
        assert!(matches!(
            msg.set(4, Value::Uint32(1)),
            Err(WireError::CardinalityMismatch { field: 4, .. })
        ));
        assert!(matches!(
            msg.push(1, "x"),
            Err(WireError::CardinalityMismatch { field: 1, .. })
        ));
        assert!(matches!(
            msg.set(2, "not a number"),
            Err(WireError::ValueRange { field: 2, .. })
        ));
        assert!(matches!(
            msg.set_i64(2, i64::from(i32::MAX) + 1),
            Err(WireError::ValueRange { field: 2, .. })
        ));
        assert!(matches!(
            msg.set_i64(1, 3),
            Err(WireError::ValueRange { field: 1, .. })
        ));
        assert!(!msg.has(2));

        msg.set_i64(2, -7).unwrap();
        msg.push(4, Value::Uint32(5)).unwrap();
        assert_eq!(msg.get(2), Some(&Value::Int32(-7)));
        assert_eq!(msg.get_repeated(4), &[Value::Uint32(5)]);
        assert!(msg.clear(2));
        assert!(!msg.has(2));
    }

    #[test]
    fn explicit_zero_is_present() {
        let mut msg = DynamicMessage::new(person());
        msg.set(2, Value::Int32(0)).unwrap();
        assert!(msg.has(2));
        assert_eq!(serialized_size_of(&msg, WireOptions::default()).unwrap(), 2);
        assert_eq!(
            serialize_to_vec(&msg, WireOptions::default()).unwrap(),
            vec![0x10, 0x00]
        );

        let omit = WireOptions::default().with_default_values(DefaultValuePolicy::OmitDefaults);
        assert_eq!(serialized_size_of(&msg, omit).unwrap(), 0);
        assert!(serialize_to_vec(&msg, omit).unwrap().is_empty());
    }

    #[test]
    fn fields_are_written_in_number_order() {
        let mut msg = DynamicMessage::new(person());
        msg.set(3, "a@b").unwrap();
        msg.set(1, "Al").unwrap();
        msg.set_u64(2, 1).unwrap();
        let bytes = serialize_to_vec(&msg, WireOptions::default()).unwrap();
        assert_eq!(
            bytes,
            vec![0x0a, 2, b'A', b'l', 0x10, 1, 0x1a, 3, b'a', b'@', b'b']
        );
    }

    #[test]
    fn extensions_are_validated_and_sized() {
        let mut msg = DynamicMessage::new(person());
        assert!(matches!(
            msg.extensions_mut().insert(2, true),
            Err(WireError::FieldCollision { field: 2, .. })
        ));
        msg.extensions_mut().insert(100, true).unwrap();
        assert_eq!(serialized_size_of(&msg, WireOptions::default()).unwrap(), 3);

        let other = MessageDescriptor::builder("Other").build().unwrap();
        let mut foreign = ExtensionFieldMap::for_descriptor(other);
        foreign.insert(1, true).unwrap();
        assert!(matches!(
            msg.set_extensions(foreign),
            Err(WireError::FieldCollision { field: 1, .. })
        ));
        assert_eq!(msg.extensions().map(ExtensionFieldMap::len), Some(1));
    }

    #[test]
    fn adopted_extensions_are_checked_against_the_new_owner() {
        let descriptor = person();
        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.set_i64(2, 1).unwrap();

        let other = MessageDescriptor::builder("Other").build().unwrap();
        let mut foreign = ExtensionFieldMap::for_descriptor(other);
        foreign.insert(100, true).unwrap();
        msg.set_extensions(foreign).unwrap();
        assert!(Arc::ptr_eq(msg.extensions().unwrap().owner(), &descriptor));

        assert!(matches!(
            msg.extensions_mut().insert(2, Value::Int32(7)),
            Err(WireError::FieldCollision { field: 2, .. })
        ));
        assert!(matches!(
            msg.extensions_mut().push(3, "dup@example.com"),
            Err(WireError::FieldCollision { field: 3, .. })
        ));
        assert_eq!(
            serialize_to_vec(&msg, WireOptions::default()).unwrap(),
            vec![0x10, 0x01, 0xa0, 0x06, 0x01]
        );
    }

    #[test]
    fn serialize_into_reports_written_bytes() {
        let mut msg = DynamicMessage::new(person());
        msg.set(1, "Al").unwrap();
        let mut sink = bytes::BytesMut::new();
        let written = serialize_into(&msg, WireOptions::default(), &mut sink).unwrap();
        assert_eq!(written, 4);
        assert_eq!(&sink[..], &[0x0a, 2, b'A', b'l']);
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::ComputeSizeContext;
use crate::descriptor::MessageDescriptor;
use crate::error::{Result, WireError};
use crate::field::{FieldLayout, FieldSlot, encode_slot, slot_size};
use crate::sink::{CountingSink, WireSink};
use crate::size::SizeCalculator;
use crate::value::Value;
use crate::wire::is_valid_field_number;

/// `ExtensionFieldMap` 保存消息描述符之外的扩展字段。
///
/// # 教案式说明
/// - **意图 (Why)**：schema 演进时，第三方可在不修改原消息定义的前提下挂载编号字段；
///   这些字段与核心字段共享同一套长度/编码算法，只是取值来源不同。
/// - **契约 (What)**：
///   - 字段号与所属消息声明的字段号互斥，冲突在插入时以 [`WireError::FieldCollision`] 拒绝，
///     而非在每次序列化时检查；
///   - 扩展字段不支持 packed，值的种类即决定 wire type；
///   - 长度可加且与插入顺序无关，编码按字段号升序写出。
/// - **执行逻辑 (How)**：内部以 `BTreeMap<u32, FieldSlot>` 保存，单值与重复扩展各占一个槽。
#[derive(Debug, Clone)]
pub struct ExtensionFieldMap {
    owner: Arc<MessageDescriptor>,
    entries: BTreeMap<u32, FieldSlot>,
}

impl ExtensionFieldMap {
    /// 为给定消息创建空扩展表。
    pub fn for_descriptor(owner: Arc<MessageDescriptor>) -> Self {
        Self {
            owner,
            entries: BTreeMap::new(),
        }
    }

    /// 扩展表所属消息的描述符。
    pub fn owner(&self) -> &Arc<MessageDescriptor> {
        &self.owner
    }

    /// 设置单值扩展；已存在的单值扩展会被覆盖。
    pub fn insert(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        self.check_number(number)?;
        if let Some(FieldSlot::Repeated(_)) = self.entries.get(&number) {
            return Err(WireError::CardinalityMismatch {
                field: number,
                expected: "singular",
                actual: "repeated",
            });
        }
        self.entries.insert(number, FieldSlot::Single(value.into()));
        Ok(())
    }

    /// 向重复扩展追加元素；同一扩展内的元素必须同种类。
    pub fn push(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        self.check_number(number)?;
        let value = value.into();
        match self
            .entries
            .entry(number)
            .or_insert_with(|| FieldSlot::Repeated(Vec::new()))
        {
            FieldSlot::Single(_) => Err(WireError::CardinalityMismatch {
                field: number,
                expected: "repeated",
                actual: "singular",
            }),
            FieldSlot::Repeated(values) => {
                if let Some(first) = values.first() {
                    if first.kind() != value.kind() {
                        return Err(WireError::ValueRange {
                            field: number,
                            kind: first.kind(),
                            detail: format!("repeated extension cannot hold `{}`", value.kind()),
                        });
                    }
                }
                values.push(value);
                Ok(())
            }
        }
    }

    /// 移除扩展，返回其是否存在。
    pub fn remove(&mut self, number: u32) -> bool {
        self.entries.remove(&number).is_some()
    }

    /// 读取单值扩展。
    pub fn get(&self, number: u32) -> Option<&Value> {
        match self.entries.get(&number) {
            Some(FieldSlot::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// 读取重复扩展；不存在时返回空切片。
    pub fn get_repeated(&self, number: u32) -> &[Value] {
        match self.entries.get(&number) {
            Some(FieldSlot::Repeated(values)) => values,
            _ => &[],
        }
    }

    /// 已登记的扩展字段号，升序。
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 全部扩展的字节数。
    pub fn serialized_size(&self, ctx: &dyn ComputeSizeContext) -> Result<u64> {
        self.size_with(ctx.size_calculator(), ctx)
    }

    /// 按字段号升序写出全部扩展。
    pub fn encode(&self, ctx: &dyn ComputeSizeContext, sink: &mut dyn WireSink) -> Result<()> {
        let mut out = CountingSink::new(sink);
        self.encode_into(ctx, &mut out)
    }

    /// 供所属消息复用其已获取的计算器。
    pub(crate) fn size_with(
        &self,
        calc: &dyn SizeCalculator,
        ctx: &dyn ComputeSizeContext,
    ) -> Result<u64> {
        let mut total = 0;
        for (&number, slot) in &self.entries {
            if let Some(layout) = layout_of(number, slot) {
                total += slot_size(calc, ctx, layout, slot)?;
            }
        }
        Ok(total)
    }

    pub(crate) fn encode_into(
        &self,
        ctx: &dyn ComputeSizeContext,
        out: &mut CountingSink<'_>,
    ) -> Result<()> {
        for (&number, slot) in &self.entries {
            if let Some(layout) = layout_of(number, slot) {
                encode_slot(ctx, out, layout, slot)?;
            }
        }
        Ok(())
    }

    /// 将扩展表归属到 `owner`：先校验已有字段号与其互斥，再替换归属，
    /// 此后的插入均以新归属校验。
    pub(crate) fn adopt(mut self, owner: Arc<MessageDescriptor>) -> Result<Self> {
        if let Some(&number) = self.entries.keys().find(|number| owner.declares(**number)) {
            return Err(self.collision(owner.name(), number));
        }
        self.owner = owner;
        Ok(self)
    }

    fn check_number(&self, number: u32) -> Result<()> {
        if !is_valid_field_number(number) {
            return Err(WireError::InvalidFieldNumber { field: number });
        }
        if self.owner.declares(number) {
            return Err(self.collision(self.owner.name(), number));
        }
        Ok(())
    }

    fn collision(&self, message: &str, number: u32) -> WireError {
        tracing::warn!(
            message_name = message,
            field = number,
            "rejected extension colliding with a declared field"
        );
        WireError::FieldCollision {
            message: message.to_owned(),
            field: number,
        }
    }
}

/// 空的重复扩展没有种类可言，长度为零，直接跳过。
fn layout_of(number: u32, slot: &FieldSlot) -> Option<FieldLayout> {
    let kind = match slot {
        FieldSlot::Single(value) => value.kind(),
        FieldSlot::Repeated(values) => values.first()?.kind(),
    };
    Some(FieldLayout {
        number,
        kind,
        packed: false,
    })
}

//! 字段与消息描述符。
//!
//! 描述符由外部 schema 编译器的产物驱动构建；本模块只负责结构校验（字段号唯一且合法、
//! packed 仅用于可打包种类），不解析 `.proto` 语法。

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Result, WireError};
use crate::value::ScalarKind;
use crate::wire::{WireType, is_valid_field_number, tag_size};

/// 字段基数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Singular,
    Repeated,
}

impl Cardinality {
    pub const fn as_str(self) -> &'static str {
        match self {
            Cardinality::Singular => "singular",
            Cardinality::Repeated => "repeated",
        }
    }
}

/// 单个字段的声明。
///
/// ### What
/// - `number`：消息内唯一的字段号；
/// - `kind`：标量种类，决定 wire type；
/// - `cardinality`：单值或重复；
/// - `packed`：重复数值字段是否以单个 length-delimited 块写出，默认关闭。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    number: u32,
    name: Cow<'static, str>,
    kind: ScalarKind,
    cardinality: Cardinality,
    packed: bool,
}

impl FieldDescriptor {
    /// 声明单值字段。
    pub fn singular(number: u32, name: impl Into<Cow<'static, str>>, kind: ScalarKind) -> Self {
        Self {
            number,
            name: name.into(),
            kind,
            cardinality: Cardinality::Singular,
            packed: false,
        }
    }

    /// 声明重复字段（非打包）。
    pub fn repeated(number: u32, name: impl Into<Cow<'static, str>>, kind: ScalarKind) -> Self {
        Self {
            cardinality: Cardinality::Repeated,
            ..Self::singular(number, name, kind)
        }
    }

    /// 标记为 packed；合法性在 [`MessageDescriptorBuilder::build`] 中校验。
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// 该字段在线格式中使用的 wire type；packed 字段恒为 length-delimited。
    pub fn wire_type(&self) -> WireType {
        if self.packed {
            WireType::LengthDelimited
        } else {
            self.kind.wire_type()
        }
    }

    /// 该字段 tag 的字节数。
    pub fn tag_size(&self) -> u64 {
        tag_size(self.number, self.wire_type())
    }

    fn validate(&self) -> Result<()> {
        if !is_valid_field_number(self.number) {
            return Err(WireError::InvalidFieldNumber { field: self.number });
        }
        if self.packed && (!self.is_repeated() || !self.kind.is_packable()) {
            return Err(WireError::InvalidPacking {
                field: self.number,
                kind: self.kind,
            });
        }
        Ok(())
    }
}

/// 消息的字段表，按字段号升序保存。
#[derive(Debug, PartialEq, Eq)]
pub struct MessageDescriptor {
    name: Cow<'static, str>,
    fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    /// 开始构建描述符。
    pub fn builder(name: impl Into<Cow<'static, str>>) -> MessageDescriptorBuilder {
        MessageDescriptorBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 按字段号升序排列的全部字段。
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// 按字段号查找声明。
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields
            .binary_search_by_key(&number, FieldDescriptor::number)
            .ok()
            .map(|idx| &self.fields[idx])
    }

    /// 该字段号是否由消息自身声明。
    pub fn declares(&self, number: u32) -> bool {
        self.field(number).is_some()
    }
}

/// [`MessageDescriptor`] 的构建器。
#[derive(Debug)]
pub struct MessageDescriptorBuilder {
    name: Cow<'static, str>,
    fields: Vec<FieldDescriptor>,
}

impl MessageDescriptorBuilder {
    /// 追加字段声明，顺序不限。
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// 校验并冻结描述符。
    ///
    /// # 契约说明（What）
    /// - 字段号非法返回 `InvalidFieldNumber`，重复返回 `DuplicateField`，非法打包返回 `InvalidPacking`；
    /// - 成功后字段按字段号升序排列，编码顺序即由此决定。
    pub fn build(mut self) -> Result<Arc<MessageDescriptor>> {
        for field in &self.fields {
            field.validate()?;
        }
        self.fields.sort_by_key(FieldDescriptor::number);
        if let Some(pair) = self.fields.windows(2).find(|w| w[0].number == w[1].number) {
            return Err(WireError::DuplicateField {
                message: self.name.into_owned(),
                field: pair[0].number,
            });
        }
        Ok(Arc::new(MessageDescriptor {
            name: self.name,
            fields: self.fields,
        }))
    }
}

use core::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::message::Message;
use crate::wire::WireType;

/// 字段声明的标量种类，决定 wire type 与计算路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
    Message,
    Enum,
}

impl ScalarKind {
    /// 该种类在线格式中的布局。
    pub const fn wire_type(self) -> WireType {
        match self {
            ScalarKind::Bool
            | ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::Uint32
            | ScalarKind::Uint64
            | ScalarKind::Sint32
            | ScalarKind::Sint64
            | ScalarKind::Enum => WireType::Varint,
            ScalarKind::Fixed64 | ScalarKind::Sfixed64 | ScalarKind::Double => WireType::Fixed64,
            ScalarKind::Fixed32 | ScalarKind::Sfixed32 | ScalarKind::Float => WireType::Fixed32,
            ScalarKind::String | ScalarKind::Bytes | ScalarKind::Message => {
                WireType::LengthDelimited
            }
        }
    }

    /// 仅数值类（varint / fixed32 / fixed64）的重复字段允许打包。
    pub const fn is_packable(self) -> bool {
        !matches!(
            self,
            ScalarKind::String | ScalarKind::Bytes | ScalarKind::Message
        )
    }

    /// `.proto` 中的类型名。
    pub const fn as_str(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Message => "message",
            ScalarKind::Enum => "enum",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段值的带标签联合体。
///
/// ### What
/// - 数值变体与 `.proto` 标量一一对应，`Enum` 以 int32 承载；
/// - `Message` 以 `Arc<dyn Message>` 持有子消息，允许同一实例被多个父消息共享；
/// - 取值范围由访问器在构造时保证，核心只负责计算与写出。
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Sint32(i32),
    Sint64(i64),
    Fixed32(u32),
    Fixed64(u64),
    Sfixed32(i32),
    Sfixed64(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
    Message(Arc<dyn Message>),
    Enum(i32),
}

impl Value {
    /// 值所属的标量种类。
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::Bool(_) => ScalarKind::Bool,
            Value::Int32(_) => ScalarKind::Int32,
            Value::Int64(_) => ScalarKind::Int64,
            Value::Uint32(_) => ScalarKind::Uint32,
            Value::Uint64(_) => ScalarKind::Uint64,
            Value::Sint32(_) => ScalarKind::Sint32,
            Value::Sint64(_) => ScalarKind::Sint64,
            Value::Fixed32(_) => ScalarKind::Fixed32,
            Value::Fixed64(_) => ScalarKind::Fixed64,
            Value::Sfixed32(_) => ScalarKind::Sfixed32,
            Value::Sfixed64(_) => ScalarKind::Sfixed64,
            Value::Float(_) => ScalarKind::Float,
            Value::Double(_) => ScalarKind::Double,
            Value::String(_) => ScalarKind::String,
            Value::Bytes(_) => ScalarKind::Bytes,
            Value::Message(_) => ScalarKind::Message,
            Value::Enum(_) => ScalarKind::Enum,
        }
    }

    /// 包装子消息。
    pub fn message<M>(message: M) -> Self
    where
        M: Message + 'static,
    {
        Value::Message(Arc::new(message))
    }

    /// 是否等于其类型的零值。
    ///
    /// 浮点按位比较：`-0.0` 不是零值。消息恒返回 `false`。
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(v) => !*v,
            Value::Int32(v) | Value::Sint32(v) | Value::Sfixed32(v) | Value::Enum(v) => *v == 0,
            Value::Int64(v) | Value::Sint64(v) | Value::Sfixed64(v) => *v == 0,
            Value::Uint32(v) | Value::Fixed32(v) => *v == 0,
            Value::Uint64(v) | Value::Fixed64(v) => *v == 0,
            Value::Float(v) => v.to_bits() == 0,
            Value::Double(v) => v.to_bits() == 0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Message(_) => false,
        }
    }

    /// 将 `i64` 按目标种类做带范围检查的转换，供访问器边界使用。
    pub(crate) fn coerce_i64(kind: ScalarKind, v: i64) -> Result<Value, String> {
        let narrow = |v: i64| i32::try_from(v).map_err(|_| format!("{v} does not fit in 32 bits"));
        let unsigned =
            |v: i64| u64::try_from(v).map_err(|_| format!("{v} is negative for an unsigned kind"));
        Ok(match kind {
            ScalarKind::Int32 => Value::Int32(narrow(v)?),
            ScalarKind::Sint32 => Value::Sint32(narrow(v)?),
            ScalarKind::Sfixed32 => Value::Sfixed32(narrow(v)?),
            ScalarKind::Enum => Value::Enum(narrow(v)?),
            ScalarKind::Int64 => Value::Int64(v),
            ScalarKind::Sint64 => Value::Sint64(v),
            ScalarKind::Sfixed64 => Value::Sfixed64(v),
            ScalarKind::Uint32 | ScalarKind::Fixed32 | ScalarKind::Uint64 | ScalarKind::Fixed64 => {
                return Value::coerce_u64(kind, unsigned(v)?);
            }
            other => return Err(format!("integer value for non-integer kind `{other}`")),
        })
    }

    /// 将 `u64` 按目标种类做带范围检查的转换。
    pub(crate) fn coerce_u64(kind: ScalarKind, v: u64) -> Result<Value, String> {
        let narrow = |v: u64| u32::try_from(v).map_err(|_| format!("{v} does not fit in 32 bits"));
        Ok(match kind {
            ScalarKind::Uint32 => Value::Uint32(narrow(v)?),
            ScalarKind::Fixed32 => Value::Fixed32(narrow(v)?),
            ScalarKind::Uint64 => Value::Uint64(v),
            ScalarKind::Fixed64 => Value::Fixed64(v),
            ScalarKind::Int32
            | ScalarKind::Sint32
            | ScalarKind::Sfixed32
            | ScalarKind::Enum
            | ScalarKind::Int64
            | ScalarKind::Sint64
            | ScalarKind::Sfixed64 => {
                let signed =
                    i64::try_from(v).map_err(|_| format!("{v} exceeds the signed 64-bit range"))?;
                return Value::coerce_i64(kind, signed);
            }
            other => return Err(format!("integer value for non-integer kind `{other}`")),
        })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
            Value::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
            Value::Uint32(v) => f.debug_tuple("Uint32").field(v).finish(),
            Value::Uint64(v) => f.debug_tuple("Uint64").field(v).finish(),
            Value::Sint32(v) => f.debug_tuple("Sint32").field(v).finish(),
            Value::Sint64(v) => f.debug_tuple("Sint64").field(v).finish(),
            Value::Fixed32(v) => f.debug_tuple("Fixed32").field(v).finish(),
            Value::Fixed64(v) => f.debug_tuple("Fixed64").field(v).finish(),
            Value::Sfixed32(v) => f.debug_tuple("Sfixed32").field(v).finish(),
            Value::Sfixed64(v) => f.debug_tuple("Sfixed64").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Value::String(v) => f.debug_tuple("String").field(v).finish(),
            Value::Bytes(v) => f.debug_tuple("Bytes").field(v).finish(),
            Value::Message(m) => f.debug_tuple("Message").field(&m.message_name()).finish(),
            Value::Enum(v) => f.debug_tuple("Enum").field(v).finish(),
        }
    }
}

impl PartialEq for Value {
    /// 标量按值比较（浮点按位），消息按实例身份比较。
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b))
            | (Value::Sint32(a), Value::Sint32(b))
            | (Value::Sfixed32(a), Value::Sfixed32(b))
            | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Int64(a), Value::Int64(b))
            | (Value::Sint64(a), Value::Sint64(b))
            | (Value::Sfixed64(a), Value::Sfixed64(b)) => a == b,
            (Value::Uint32(a), Value::Uint32(b)) | (Value::Fixed32(a), Value::Fixed32(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) | (Value::Fixed64(a), Value::Fixed64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<Arc<dyn Message>> for Value {
    fn from(v: Arc<dyn Message>) -> Self {
        Value::Message(v)
    }
}

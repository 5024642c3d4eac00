//! # spark-codec-protobuf
//!
//! ## 定位与职责（Why）
//! - 为由 schema 描述符生成的 Protocol Buffers 消息提供线格式长度预计算与编码核心；
//! - 长度遍历与编码遍历共用同一套逐字段算法，length-delimited 子消息的长度前缀因此与实际写出的
//!   字节数逐位一致，且子消息长度在一趟序列化内只计算一次。
//!
//! ## 架构嵌入（Where）
//! - `wire`：tag、varint 与 zigzag 的纯函数；
//! - `size`：[`SizeCalculator`] 契约与标准实现 [`BinarySizeCalculator`]；
//! - `context`：单趟遍历状态 [`SizeContext`]，负责环检测、深度上限与子消息长度缓存；
//! - `descriptor` / `value` / `message`：描述符、值与 [`DynamicMessage`]；
//! - `extension`：挂载于消息之外的 [`ExtensionFieldMap`]；
//! - `sink`：编码输出端 [`WireSink`]；
//! - `options` / `error`：[`WireOptions`] 与带稳定错误码的 [`WireError`]；
//! - `test_stubs`：记录型计算器与脚本化消息，供下游测试复用。
//!
//! ## 使用概览（How）
//! ```
//! use spark_codec_protobuf::{
//!     DynamicMessage, FieldDescriptor, MessageDescriptor, ScalarKind, WireOptions, serialize_to_vec,
//! };
//!
//! let descriptor = MessageDescriptor::builder("Test1")
//!     .field(FieldDescriptor::singular(1, "a", ScalarKind::Int32))
//!     .build()?;
//! let mut message = DynamicMessage::new(descriptor);
//! message.set_i64(1, 150)?;
//! assert_eq!(serialize_to_vec(&message, WireOptions::default())?, vec![0x08, 0x96, 0x01]);
//! # Ok::<(), spark_codec_protobuf::WireError>(())
//! ```
//!
//! ## Feature 策略（Trade-offs）
//! - `config`（默认开启）引入 `toml`，提供 [`WireOptions::from_toml_str`]；关闭后选项只能以代码构造；
//! - 解码与 `.proto` 解析不在本 crate 范围内。

pub mod context;
pub mod descriptor;
pub mod error;
pub mod extension;
mod field;
pub mod message;
pub mod options;
pub mod sink;
pub mod size;
pub mod test_stubs;
pub mod value;
pub mod wire;

pub use crate::context::{ComputeSizeContext, InstanceId, NestingGuard, SizeContext};
pub use crate::descriptor::{
    Cardinality, FieldDescriptor, MessageDescriptor, MessageDescriptorBuilder,
};
pub use crate::error::{Result, WireError, codes};
pub use crate::extension::ExtensionFieldMap;
pub use crate::message::{
    DynamicMessage, Message, serialize_into, serialize_to_vec, serialized_size_of,
};
pub use crate::options::{DefaultValuePolicy, WireOptions};
pub use crate::sink::{CountingSink, IoSink, WireSink};
pub use crate::size::{BinarySizeCalculator, SizeCalculator};
pub use crate::value::{ScalarKind, Value};
pub use crate::wire::WireType;

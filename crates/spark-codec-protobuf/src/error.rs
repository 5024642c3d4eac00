//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义长度预计算、编码、描述符构建与访问器校验路径上的全部失败语义；
//! - 每个变体对应一个稳定错误码（参见 [`codes`]），便于日志与告警按 `<域>.<语义>` 聚合。
//!
//! ## 设计要求（What）
//! - 所有错误均派生 [`thiserror::Error`]，可直接交给 `anyhow` 等上层框架；
//! - `CycleDetected` / `RecursionLimitExceeded` / `EncodeLengthMismatch` 属于整趟遍历的终止性错误，
//!   调用方不得使用已写出的任何前缀字节；
//! - 本 crate 不做内部重试，重试策略归属外层传输。

use thiserror::Error;

use crate::value::ScalarKind;

/// 稳定错误码集合，遵循 `<域>.<语义>` 命名约定。
pub mod codes {
    /// 值超出声明类型的取值范围，或值变体与声明类型不符。
    pub const VALUE_RANGE: &str = "protobuf.value_range";
    /// 扩展字段号与消息自身声明的字段号冲突。
    pub const FIELD_COLLISION: &str = "protobuf.field_collision";
    /// 访问了描述符中不存在的字段。
    pub const UNKNOWN_FIELD: &str = "protobuf.unknown_field";
    /// 单值/重复访问器与字段基数不符。
    pub const CARDINALITY_MISMATCH: &str = "protobuf.cardinality_mismatch";
    /// 描述符中字段号重复。
    pub const DUPLICATE_FIELD: &str = "protobuf.duplicate_field";
    /// 字段号越界或落入保留区间。
    pub const INVALID_FIELD_NUMBER: &str = "protobuf.invalid_field_number";
    /// 对不可打包的字段声明了 packed。
    pub const INVALID_PACKING: &str = "protobuf.invalid_packing";
    /// 遍历中发现消息传递性地包含自身。
    pub const CYCLE_DETECTED: &str = "protobuf.cycle_detected";
    /// 嵌套深度超过上限。
    pub const RECURSION_LIMIT: &str = "protobuf.recursion_limit";
    /// 编码输出长度与预计算长度不一致。
    pub const LENGTH_MISMATCH: &str = "protobuf.length_mismatch";
    /// 写入端接收的字节少于提交的字节。
    pub const SHORT_WRITE: &str = "protobuf.short_write";
    /// 写入端的底层 I/O 失败。
    pub const SINK_IO: &str = "protobuf.sink_io";
    /// 配置解析失败。
    pub const CONFIG: &str = "protobuf.config";
}

/// 线格式核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合访问器、描述符构建、长度/编码两趟遍历与写入端的异常，供调用方统一 `?` 传播；
/// - **契约 (What)**：所有变体均为 `Send + Sync + 'static`；[`WireError::code`] 返回稳定错误码；
/// - **执行逻辑 (How)**：变体携带字段号、消息名等可读上下文，`Display` 由 `thiserror` 生成。
#[derive(Debug, Error)]
pub enum WireError {
    /// 值超出声明类型的取值范围，或值变体与字段声明的类型不符。
    ///
    /// - **契约 (What)**：由访问器边界抛出，核心从不静默截断数值。
    #[error("field {field}: value out of range for `{kind}`: {detail}")]
    ValueRange {
        field: u32,
        kind: ScalarKind,
        detail: String,
    },

    /// 扩展字段号与所属消息的核心字段号冲突，在注册时即被拒绝。
    #[error("extension field {field} collides with a field declared by `{message}`")]
    FieldCollision { message: String, field: u32 },

    /// 描述符中不存在该字段号。
    #[error("message `{message}` declares no field {field}")]
    UnknownField { message: String, field: u32 },

    /// 对重复字段调用了单值访问器，或反之。
    #[error("field {field} is {actual}, accessor expected {expected}")]
    CardinalityMismatch {
        field: u32,
        expected: &'static str,
        actual: &'static str,
    },

    /// 构建描述符时发现重复字段号。
    #[error("message `{message}` declares field {field} more than once")]
    DuplicateField { message: String, field: u32 },

    /// 字段号为 0、超过 2^29-1，或落入 19000..=19999 保留区。
    #[error("field number {field} is outside the valid range")]
    InvalidFieldNumber { field: u32 },

    /// 仅重复的数值类字段允许 packed 编码。
    #[error("field {field} of kind `{kind}` cannot be packed")]
    InvalidPacking { field: u32, kind: ScalarKind },

    /// 消息在自身的祖先路径上再次出现。
    #[error("message `{message}` transitively contains itself")]
    CycleDetected { message: String },

    /// 嵌套深度超过 [`crate::WireOptions::max_depth`]。
    #[error("message nesting exceeds the limit of {limit}")]
    RecursionLimitExceeded { limit: usize },

    /// 编码写出的字节数与长度遍历的结果不一致。
    ///
    /// - **契约 (What)**：属于程序缺陷信号；长度前缀依赖精确的预计算值，因此绝不容忍。
    #[error("message `{message}` encoded {actual} bytes but its computed size is {expected}")]
    EncodeLengthMismatch {
        message: String,
        expected: u64,
        actual: u64,
    },

    /// 写入端只接收了部分字节。
    #[error("sink accepted {written} of {requested} bytes")]
    ShortWrite { requested: usize, written: usize },

    /// 写入端底层 I/O 失败。
    #[error("sink i/o failure")]
    Io(#[from] std::io::Error),

    /// `WireOptions` 的 TOML 配置无法解析。
    #[cfg(feature = "config")]
    #[error("invalid wire options")]
    Config(#[from] toml::de::Error),
}

impl WireError {
    /// 返回该错误对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            WireError::ValueRange { .. } => codes::VALUE_RANGE,
            WireError::FieldCollision { .. } => codes::FIELD_COLLISION,
            WireError::UnknownField { .. } => codes::UNKNOWN_FIELD,
            WireError::CardinalityMismatch { .. } => codes::CARDINALITY_MISMATCH,
            WireError::DuplicateField { .. } => codes::DUPLICATE_FIELD,
            WireError::InvalidFieldNumber { .. } => codes::INVALID_FIELD_NUMBER,
            WireError::InvalidPacking { .. } => codes::INVALID_PACKING,
            WireError::CycleDetected { .. } => codes::CYCLE_DETECTED,
            WireError::RecursionLimitExceeded { .. } => codes::RECURSION_LIMIT,
            WireError::EncodeLengthMismatch { .. } => codes::LENGTH_MISMATCH,
            WireError::ShortWrite { .. } => codes::SHORT_WRITE,
            WireError::Io(_) => codes::SINK_IO,
            #[cfg(feature = "config")]
            WireError::Config(_) => codes::CONFIG,
        }
    }

    /// 是否属于终止整趟遍历的错误；命中时调用方必须丢弃已写出的全部输出。
    pub fn aborts_pass(&self) -> bool {
        matches!(
            self,
            WireError::CycleDetected { .. }
                | WireError::RecursionLimitExceeded { .. }
                | WireError::EncodeLengthMismatch { .. }
        )
    }
}

/// crate 内统一的结果别名。
pub type Result<T, E = WireError> = core::result::Result<T, E>;

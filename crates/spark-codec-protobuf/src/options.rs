//! 单趟序列化的可调参数。
//!
//! ### 契约说明（What）
//! - `max_depth`：允许的最大消息嵌套深度，默认 100（与主流 protobuf 运行时的递归上限一致）；
//! - `default_values`：显式设置为零值的字段是否写出，参见 [`DefaultValuePolicy`]。
//!
//! 启用 `config` Feature 时可通过 [`WireOptions::from_toml_str`] 从 TOML 片段加载，缺省键回落到默认值：
//!
//! ```toml
//! max_depth = 64
//! default_values = "omit-defaults"
//! ```

use serde::Deserialize;

/// 默认的最大嵌套深度。
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// 显式设置为零值的字段如何处理。
///
/// - `Presence`：只要字段带有“已设置”标记就写出（proto2 / `optional` 语义）；
/// - `OmitDefaults`：单值标量若等于其类型零值（`0`、`false`、空串、空字节）则视同未设置，
///   消息字段与重复字段不受影响（proto3 隐式存在语义）。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultValuePolicy {
    #[default]
    Presence,
    OmitDefaults,
}

/// 长度遍历与编码遍历共享的选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WireOptions {
    pub max_depth: usize,
    pub default_values: DefaultValuePolicy,
}

impl Default for WireOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_values: DefaultValuePolicy::Presence,
        }
    }
}

impl WireOptions {
    /// 以给定的嵌套上限构造选项。
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 指定零值字段的处理策略。
    pub fn with_default_values(mut self, policy: DefaultValuePolicy) -> Self {
        self.default_values = policy;
        self
    }

    /// 从 TOML 片段解析选项。
    #[cfg(feature = "config")]
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(all(test, feature = "config"))]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let options = WireOptions::from_toml_str("").expect("空文档应回落到默认值");
        assert_eq!(options, WireOptions::default());
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parses_all_keys() {
        let options = WireOptions::from_toml_str(
            "max_depth = 8\ndefault_values = \"omit-defaults\"\n",
        )
        .expect("合法配置");
        assert_eq!(
            options,
            WireOptions::default()
                .with_max_depth(8)
                .with_default_values(DefaultValuePolicy::OmitDefaults)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = WireOptions::from_toml_str("max_dept = 8").expect_err("拼写错误的键应被拒绝");
        assert_eq!(err.code(), crate::error::codes::CONFIG);
    }
}

//! 长度计算链路的测试桩集合。
//!
//! # 设计定位（Why）
//! - 消息只通过 [`ComputeSizeContext`](crate::context::ComputeSizeContext) 与
//!   [`SizeCalculator`](crate::size::SizeCalculator) 两个契约接触计算逻辑，测试替换这两处即可观察
//!   “调用了哪些计算、以什么参数、调用了几次”，而无需改动消息实现；
//! - 子消息同样以 trait 对象出现，测试可以挂载长度固定的替身，独立验证父消息的组合规则。
//!
//! # 使用方式（How）
//! - `use spark_codec_protobuf::test_stubs::calculator::*;` 获取记录型计算器与计数上下文；
//! - `use spark_codec_protobuf::test_stubs::message::ScriptedMessage;` 获取脚本化子消息。
//!
//! # 风险与权衡（Trade-offs）
//! - 记录型实现基于 `RefCell`，不是 `Sync`，只适用于单线程测试。

pub mod calculator {
    //! 记录型 [`SizeCalculator`] 与计数型上下文。

    use std::cell::{Cell, RefCell};

    use crate::context::{ComputeSizeContext, InstanceId, SizeContext};
    use crate::error::Result;
    use crate::options::WireOptions;
    use crate::size::{BinarySizeCalculator, SizeCalculator};

    /// 一次计算器调用及其参数。
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SizeCall {
        Varint(u64),
        Zigzag32(i32),
        Zigzag64(i64),
        String(String),
        ByteStream(Vec<u8>),
    }

    /// 记录每次调用的计算器。
    ///
    /// # 契约说明（What）
    /// - 未被脚本覆盖的调用委托给 [`BinarySizeCalculator`]；
    /// - [`script`](Self::script) 登记的参数返回预设结果，便于构造与真实线格式无关的断言；
    /// - [`calls`](Self::calls) 按调用顺序返回 `(调用, 结果)`。
    #[derive(Debug, Default)]
    pub struct RecordingSizeCalculator {
        scripted: Vec<(SizeCall, u64)>,
        calls: RefCell<Vec<(SizeCall, u64)>>,
    }

    impl RecordingSizeCalculator {
        pub fn new() -> Self {
            Self::default()
        }

        /// 为指定调用预设返回值。
        pub fn script(mut self, call: SizeCall, result: u64) -> Self {
            self.scripted.push((call, result));
            self
        }

        /// 已记录的调用。
        pub fn calls(&self) -> Vec<(SizeCall, u64)> {
            self.calls.borrow().clone()
        }

        /// 满足 `filter` 的调用。
        pub fn calls_matching(&self, filter: impl Fn(&SizeCall) -> bool) -> Vec<(SizeCall, u64)> {
            self.calls
                .borrow()
                .iter()
                .filter(|(call, _)| filter(call))
                .cloned()
                .collect()
        }

        fn record(&self, call: SizeCall, computed: u64) -> u64 {
            let result = self
                .scripted
                .iter()
                .find(|(scripted, _)| *scripted == call)
                .map_or(computed, |(_, result)| *result);
            self.calls.borrow_mut().push((call, result));
            result
        }
    }

    impl SizeCalculator for RecordingSizeCalculator {
        fn compute_varint_size(&self, value: u64) -> u64 {
            let computed = BinarySizeCalculator.compute_varint_size(value);
            self.record(SizeCall::Varint(value), computed)
        }

        fn compute_zigzag32_size(&self, value: i32) -> u64 {
            let computed = BinarySizeCalculator.compute_zigzag32_size(value);
            self.record(SizeCall::Zigzag32(value), computed)
        }

        fn compute_zigzag64_size(&self, value: i64) -> u64 {
            let computed = BinarySizeCalculator.compute_zigzag64_size(value);
            self.record(SizeCall::Zigzag64(value), computed)
        }

        fn compute_string_size(&self, value: &str) -> u64 {
            let computed = BinarySizeCalculator.compute_string_size(value);
            self.record(SizeCall::String(value.to_owned()), computed)
        }

        fn compute_byte_stream_size(&self, value: &[u8]) -> u64 {
            let computed = BinarySizeCalculator.compute_byte_stream_size(value);
            self.record(SizeCall::ByteStream(value.to_vec()), computed)
        }
    }

    /// 包装 [`SizeContext`]，统计 `size_calculator` 被获取的次数。
    pub struct CountingContext<'c> {
        inner: SizeContext<'c>,
        fetches: Cell<usize>,
    }

    impl<'c> CountingContext<'c> {
        pub fn new(calculator: &'c dyn SizeCalculator) -> Self {
            Self::with_options(calculator, WireOptions::default())
        }

        pub fn with_options(calculator: &'c dyn SizeCalculator, options: WireOptions) -> Self {
            Self {
                inner: SizeContext::with_calculator(calculator, options),
                fetches: Cell::new(0),
            }
        }

        /// `size_calculator` 被调用的次数。
        pub fn calculator_fetches(&self) -> usize {
            self.fetches.get()
        }
    }

    impl ComputeSizeContext for CountingContext<'_> {
        fn size_calculator(&self) -> &dyn SizeCalculator {
            self.fetches.set(self.fetches.get() + 1);
            self.inner.size_calculator()
        }

        fn options(&self) -> &WireOptions {
            self.inner.options()
        }

        fn enter(&self, id: InstanceId, message: &str) -> Result<()> {
            self.inner.enter(id, message)
        }

        fn leave(&self, id: InstanceId) {
            self.inner.leave(id);
        }

        fn cached_size(&self, id: InstanceId) -> Option<u64> {
            self.inner.cached_size(id)
        }

        fn record_size(&self, id: InstanceId, size: u64) {
            self.inner.record_size(id, size);
        }
    }
}

pub mod message {
    //! 长度与输出均由测试预设的子消息替身。

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::context::{ComputeSizeContext, InstanceId, NestingGuard};
    use crate::error::Result;
    use crate::message::Message;
    use crate::sink::{CountingSink, WireSink};

    /// 报告固定长度、写出固定字节的消息。
    ///
    /// - 不向上下文获取计算器，父消息的计算器调用因此只反映父消息自身；
    /// - `size` 与 `bytes.len()` 可以故意不一致，用于触发长度校验；
    /// - 记录 `serialized_size` 的调用次数，便于断言长度缓存是否生效。
    #[derive(Debug)]
    pub struct ScriptedMessage {
        name: String,
        size: u64,
        bytes: Vec<u8>,
        size_calls: AtomicUsize,
    }

    impl ScriptedMessage {
        /// 长度为 `bytes.len()` 的诚实替身。
        pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
            let bytes = bytes.into();
            Self::with_reported_size(name, bytes.len() as u64, bytes)
        }

        /// 报告 `size` 却写出 `bytes` 的替身。
        pub fn with_reported_size(
            name: impl Into<String>,
            size: u64,
            bytes: impl Into<Vec<u8>>,
        ) -> Self {
            Self {
                name: name.into(),
                size,
                bytes: bytes.into(),
                size_calls: AtomicUsize::new(0),
            }
        }

        /// `serialized_size` 被调用的次数。
        pub fn size_calls(&self) -> usize {
            self.size_calls.load(Ordering::Relaxed)
        }
    }

    impl Message for ScriptedMessage {
        fn message_name(&self) -> &str {
            &self.name
        }

        fn serialized_size(&self, ctx: &dyn ComputeSizeContext) -> Result<u64> {
            let _guard = NestingGuard::enter(ctx, InstanceId::of(self), &self.name)?;
            self.size_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.size)
        }

        fn encode(&self, ctx: &dyn ComputeSizeContext, sink: &mut dyn WireSink) -> Result<()> {
            let _guard = NestingGuard::enter(ctx, InstanceId::of(self), &self.name)?;
            CountingSink::new(sink).put(&self.bytes)
        }
    }
}

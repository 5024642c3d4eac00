use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Result, WireError};
use crate::options::{DEFAULT_MAX_DEPTH, DefaultValuePolicy, WireOptions};
use crate::size::{BinarySizeCalculator, SizeCalculator};

static DEFAULT_OPTIONS: WireOptions = WireOptions {
    max_depth: DEFAULT_MAX_DEPTH,
    default_values: DefaultValuePolicy::Presence,
};

/// 消息实例的身份：数据地址加静态类型。
///
/// - 仅在单趟遍历内有意义：遍历期间消息图不可变，地址稳定且不会被复用；
/// - 按值内嵌子消息的包装类型与其首个字段地址相同，类型参与比较后二者不会被视为同一实例。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    addr: usize,
    ty: TypeId,
}

impl InstanceId {
    /// 取 `value` 的数据地址与类型 `T` 作为身份。
    ///
    /// 对 `dyn Message` 取得的身份与对具体类型取得的身份不同，同一遍历中的一组
    /// `enter`/`leave` 或缓存读写必须使用同一种视角。
    pub fn of<T: ?Sized + 'static>(value: &T) -> Self {
        InstanceId {
            addr: (value as *const T).cast::<()>() as usize,
            ty: TypeId::of::<T>(),
        }
    }
}

/// `ComputeSizeContext` 是单趟长度/编码遍历暴露给消息图的句柄。
///
/// # 设计背景（Why）
/// - 消息通过上下文获取 [`SizeCalculator`]，测试可以注入记录型实现断言调用次数与参数；
/// - 共享引用允许同一子消息挂在多个父消息下，但环会导致无限递归，需要在遍历中识别；
/// - 子消息长度在长度遍历中已经算过一次，编码遍历写长度前缀时直接复用，避免逐层重复计算。
///
/// # 契约说明（What）
/// - `enter`：实例已在当前祖先路径上时返回 `CycleDetected`；深度将超过 `max_depth` 时返回
///   `RecursionLimitExceeded`。同一实例在兄弟分支中重复出现不是环；
/// - `leave`：与成功的 `enter` 严格配对，通常借助 [`NestingGuard`] 完成；
/// - `cached_size`/`record_size`：本趟内的子消息长度缓存。
/// - **前置条件**：每次序列化调用新建一个上下文，绝不跨调用复用，以免读到过期缓存。
///
/// # 风险提示（Trade-offs）
/// - 默认实现不做任何保护，仅适合不关心图结构的测试替身；生产路径使用 [`SizeContext`]。
pub trait ComputeSizeContext {
    /// 返回本趟使用的长度计算器。
    fn size_calculator(&self) -> &dyn SizeCalculator;

    /// 返回本趟的选项。
    fn options(&self) -> &WireOptions {
        &DEFAULT_OPTIONS
    }

    /// 进入一层嵌套消息。
    fn enter(&self, _id: InstanceId, _message: &str) -> Result<()> {
        Ok(())
    }

    /// 离开一层嵌套消息。
    fn leave(&self, _id: InstanceId) {}

    /// 查询本趟已计算的子消息长度。
    fn cached_size(&self, _id: InstanceId) -> Option<u64> {
        None
    }

    /// 记录子消息长度。
    fn record_size(&self, _id: InstanceId, _size: u64) {}
}

/// 生产路径使用的单趟上下文。
///
/// 内部状态依赖 `RefCell`，因此类型不是 `Sync`：上下文无法被并发遍历共享，
/// 并行处理独立子树时应各自新建实例。
pub struct SizeContext<'c> {
    calculator: &'c dyn SizeCalculator,
    options: WireOptions,
    path: RefCell<Vec<InstanceId>>,
    sizes: RefCell<HashMap<InstanceId, u64>>,
}

impl SizeContext<'static> {
    /// 使用共享的 [`BinarySizeCalculator`] 与默认选项。
    pub fn new() -> Self {
        Self::with_options(WireOptions::default())
    }

    /// 使用共享的 [`BinarySizeCalculator`] 与给定选项。
    pub fn with_options(options: WireOptions) -> Self {
        SizeContext::with_calculator(BinarySizeCalculator::shared(), options)
    }
}

impl Default for SizeContext<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> SizeContext<'c> {
    /// 注入任意长度计算器。
    pub fn with_calculator(calculator: &'c dyn SizeCalculator, options: WireOptions) -> Self {
        Self {
            calculator,
            options,
            path: RefCell::new(Vec::new()),
            sizes: RefCell::new(HashMap::new()),
        }
    }

    /// 当前嵌套深度。
    pub fn depth(&self) -> usize {
        self.path.borrow().len()
    }
}

impl ComputeSizeContext for SizeContext<'_> {
    fn size_calculator(&self) -> &dyn SizeCalculator {
        self.calculator
    }

    fn options(&self) -> &WireOptions {
        &self.options
    }

    fn enter(&self, id: InstanceId, message: &str) -> Result<()> {
        let mut path = self.path.borrow_mut();
        if path.contains(&id) {
            return Err(WireError::CycleDetected {
                message: message.to_owned(),
            });
        }
        if path.len() >= self.options.max_depth {
            return Err(WireError::RecursionLimitExceeded {
                limit: self.options.max_depth,
            });
        }
        path.push(id);
        tracing::trace!(
            message_name = message,
            depth = path.len(),
            "entered nested message"
        );
        Ok(())
    }

    fn leave(&self, id: InstanceId) {
        let mut path = self.path.borrow_mut();
        debug_assert_eq!(path.last(), Some(&id), "enter/leave must nest");
        path.pop();
    }

    fn cached_size(&self, id: InstanceId) -> Option<u64> {
        self.sizes.borrow().get(&id).copied()
    }

    fn record_size(&self, id: InstanceId, size: u64) {
        self.sizes.borrow_mut().insert(id, size);
    }
}

/// `enter`/`leave` 的 RAII 配对。
pub struct NestingGuard<'a> {
    ctx: &'a dyn ComputeSizeContext,
    id: InstanceId,
}

impl<'a> NestingGuard<'a> {
    /// 进入一层嵌套；失败时不占用路径。
    pub fn enter(ctx: &'a dyn ComputeSizeContext, id: InstanceId, message: &str) -> Result<Self> {
        ctx.enter(id, message)?;
        Ok(Self { ctx, id })
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.ctx.leave(self.id);
    }
}

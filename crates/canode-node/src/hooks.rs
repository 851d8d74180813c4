//! 生命周期钩子
//!
//! 板级代码在状态机的固定位置插入自定义动作（例如控制外设电源）。
//! 所有钩子都在节点循环线程上执行，每次状态切换恰好调用一次。

use std::fmt;

/// 钩子闭包
pub type Hook = Box<dyn FnMut() + Send>;

/// 钩子触发点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePoint {
    /// 构建节点时，收发器初始化之前
    PreSetup,
    /// 进入休眠前，所有传感器 suspend 之后
    BeforeSleep,
    /// 唤醒后，所有传感器 resume 之后
    AfterWake,
}

/// 生命周期钩子集合（均可选）
#[derive(Default)]
pub struct LifecycleHooks {
    pre_setup: Option<Hook>,
    before_sleep: Option<Hook>,
    after_wake: Option<Hook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pre_setup(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.pre_setup = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_before_sleep(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.before_sleep = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_after_wake(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.after_wake = Some(Box::new(hook));
        self
    }

    /// 是否注册了指定触发点的钩子
    pub fn has(&self, point: LifecyclePoint) -> bool {
        self.slot(point).is_some()
    }

    /// 触发钩子，未注册时为空操作
    pub fn run(&mut self, point: LifecyclePoint) {
        let slot = match point {
            LifecyclePoint::PreSetup => &mut self.pre_setup,
            LifecyclePoint::BeforeSleep => &mut self.before_sleep,
            LifecyclePoint::AfterWake => &mut self.after_wake,
        };
        if let Some(hook) = slot.as_mut() {
            hook();
        }
    }

    fn slot(&self, point: LifecyclePoint) -> Option<&Hook> {
        match point {
            LifecyclePoint::PreSetup => self.pre_setup.as_ref(),
            LifecyclePoint::BeforeSleep => self.before_sleep.as_ref(),
            LifecyclePoint::AfterWake => self.after_wake.as_ref(),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("pre_setup", &self.pre_setup.is_some())
            .field("before_sleep", &self.before_sleep.is_some())
            .field("after_wake", &self.after_wake.is_some())
            .finish()
    }
}

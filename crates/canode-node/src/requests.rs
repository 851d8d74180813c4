//! 休眠/唤醒请求标志
//!
//! 中断上下文（命令匹配、硬件唤醒检测）与节点循环之间唯一共享的状态。
//! 写入方只做原子 store，不加锁、不分配。

use std::sync::atomic::{AtomicBool, Ordering};

/// 待处理的电源请求
///
/// 两个标志互斥：设置其中一个总会先清除另一个，
/// 因此写入返回后另一个标志一定为 `false`。
///
/// 两次 store 不是一个原子操作：多个写入方（中断、其他线程的 `NodeHandle`）
/// 并发写入时，以最后完成第二次 store 的请求为准；消费方必须只清除自己处理的标志。
#[derive(Debug, Default)]
pub struct PendingRequests {
    sleep: AtomicBool,
    wake: AtomicBool,
}

impl PendingRequests {
    pub const fn new() -> Self {
        Self {
            sleep: AtomicBool::new(false),
            wake: AtomicBool::new(false),
        }
    }

    /// 请求休眠（清除唤醒请求）
    pub fn request_sleep(&self) {
        self.wake.store(false, Ordering::Release);
        self.sleep.store(true, Ordering::Release);
    }

    /// 请求唤醒（清除休眠请求）
    pub fn request_wake(&self) {
        self.sleep.store(false, Ordering::Release);
        self.wake.store(true, Ordering::Release);
    }

    pub fn sleep_requested(&self) -> bool {
        self.sleep.load(Ordering::Acquire)
    }

    pub fn wake_requested(&self) -> bool {
        self.wake.load(Ordering::Acquire)
    }

    pub fn clear_sleep(&self) {
        self.sleep.store(false, Ordering::Release);
    }

    pub fn clear_wake(&self) {
        self.wake.store(false, Ordering::Release);
    }

    pub fn clear_all(&self) {
        self.sleep.store(false, Ordering::Release);
        self.wake.store(false, Ordering::Release);
    }

    /// 绕过互斥直接写入两个标志，用于构造并发写入交错后的状态
    #[cfg(test)]
    pub(crate) fn force(&self, sleep: bool, wake: bool) {
        self.sleep.store(sleep, Ordering::Release);
        self.wake.store(wake, Ordering::Release);
    }
}

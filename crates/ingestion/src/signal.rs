//! DrainSignal - DrainLoop 唤醒信号
//!
//! 条件变量 + 原子关闭标志。新数据和关闭请求都会立即唤醒等待者。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// 等待返回的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Data,
    Shutdown,
    Timeout,
}

/// 生产者/消费者之间的唤醒信号
#[derive(Debug, Default)]
pub struct DrainSignal {
    /// 自上次等待以来是否有新数据
    pending: Mutex<bool>,
    condvar: Condvar,
    shutdown: AtomicBool,
}

impl DrainSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 通知有新数据 (生产者侧，有界时间)
    pub fn notify_data(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.condvar.notify_one();
    }

    /// 请求关闭；持锁后通知，避免丢失唤醒
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _guard = self.pending.lock();
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// 等待新数据或关闭，最多 `timeout`
    pub fn wait_for_data(&self, timeout: Duration) -> WakeReason {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        loop {
            if self.is_shutdown() {
                return WakeReason::Shutdown;
            }
            if *pending {
                *pending = false;
                return WakeReason::Data;
            }
            if self.condvar.wait_until(&mut pending, deadline).timed_out() {
                if self.is_shutdown() {
                    return WakeReason::Shutdown;
                }
                if *pending {
                    *pending = false;
                    return WakeReason::Data;
                }
                return WakeReason::Timeout;
            }
        }
    }

    /// 只等待关闭请求 (用于节拍间隔)；返回 true 表示已关闭
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while !self.is_shutdown() {
            if self.condvar.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        self.is_shutdown()
    }

    /// 清除待处理标记 (消费者完成一轮换出后调用)
    pub fn clear_pending(&self) {
        *self.pending.lock() = false;
    }
}

//! StreamBuffer - 生产者/消费者交接区
//!
//! 每种样本一个实例。生产者 (驱动线程) 只在追加时持锁；
//! 消费者 (DrainLoop) 持锁把整个内容换出后立即释放。

use std::collections::VecDeque;
use std::sync::Arc;

use contracts::{DropPolicy, PacketKind};
use parking_lot::Mutex;

use crate::signal::DrainSignal;

/// 缓冲容量配置
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferSettings {
    /// None = 不限容量
    pub capacity: Option<usize>,
    /// 满时策略
    pub policy: DropPolicy,
}

impl BufferSettings {
    pub fn bounded(capacity: usize, policy: DropPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            policy,
        }
    }
}

impl From<&contracts::BufferConfig> for BufferSettings {
    fn from(config: &contracts::BufferConfig) -> Self {
        Self {
            capacity: config.capacity,
            policy: config.overflow_policy,
        }
    }
}

/// push 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 已追加
    Accepted,
    /// 已追加，但挤掉了最旧的一项
    EvictedOldest,
    /// 缓冲已满，新项被丢弃
    Rejected,
}

/// 单个流的缓冲
pub struct StreamBuffer<T> {
    kind: PacketKind,
    queue: Mutex<VecDeque<T>>,
    settings: BufferSettings,
    signal: Arc<DrainSignal>,
}

impl<T> StreamBuffer<T> {
    pub fn new(kind: PacketKind, settings: BufferSettings, signal: Arc<DrainSignal>) -> Self {
        let queue = match settings.capacity {
            Some(capacity) => VecDeque::with_capacity(capacity),
            None => VecDeque::new(),
        };
        Self {
            kind,
            queue: Mutex::new(queue),
            settings,
            signal,
        }
    }

    /// 无界缓冲 (独立信号)
    pub fn unbounded(kind: PacketKind) -> Self {
        Self::new(kind, BufferSettings::default(), Arc::new(DrainSignal::new()))
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn settings(&self) -> BufferSettings {
        self.settings
    }

    /// 追加一项
    ///
    /// 只在追加期间持锁，之后在锁外唤醒消费者。
    /// 被挤掉或被拒绝的项也在锁外释放。
    pub fn push(&self, item: T) -> PushOutcome {
        let (outcome, displaced) = {
            let mut queue = self.queue.lock();
            match self.settings.capacity {
                Some(capacity) if queue.len() >= capacity => match self.settings.policy {
                    DropPolicy::DropOldest => {
                        let evicted = queue.pop_front();
                        queue.push_back(item);
                        (PushOutcome::EvictedOldest, evicted)
                    }
                    DropPolicy::DropNewest => (PushOutcome::Rejected, Some(item)),
                },
                _ => {
                    queue.push_back(item);
                    (PushOutcome::Accepted, None)
                }
            }
        };
        drop(displaced);

        if outcome != PushOutcome::Rejected {
            self.signal.notify_data();
        }
        outcome
    }

    /// 换出全部内容
    ///
    /// 在此调用返回前完成的 push 全部可见。空缓冲返回空结果且不改变状态。
    pub fn drain_all(&self) -> Vec<T> {
        let drained = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return Vec::new();
            }
            std::mem::take(&mut *queue)
        };
        drained.into()
    }

    /// 当前排队的项数
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_push_then_drain_preserves_fifo() {
        let buffer = StreamBuffer::unbounded(PacketKind::Event);
        for i in 0..5 {
            assert_eq!(buffer.push(i), PushOutcome::Accepted);
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.drain_all(), vec![0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_drain_is_idempotent() {
        let buffer: StreamBuffer<u32> = StreamBuffer::unbounded(PacketKind::Imu);
        assert!(buffer.drain_all().is_empty());
        assert!(buffer.drain_all().is_empty());
        assert_eq!(buffer.len(), 0);

        buffer.push(7);
        assert_eq!(buffer.drain_all(), vec![7]);
    }

    #[test]
    fn test_drop_oldest_policy() {
        let signal = Arc::new(DrainSignal::new());
        let buffer = StreamBuffer::new(
            PacketKind::Frame,
            BufferSettings::bounded(2, DropPolicy::DropOldest),
            signal,
        );
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.push(3), PushOutcome::EvictedOldest);
        assert_eq!(buffer.drain_all(), vec![2, 3]);
    }

    #[test]
    fn test_drop_newest_policy() {
        let signal = Arc::new(DrainSignal::new());
        let buffer = StreamBuffer::new(
            PacketKind::Frame,
            BufferSettings::bounded(2, DropPolicy::DropNewest),
            signal,
        );
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.push(3), PushOutcome::Rejected);
        assert_eq!(buffer.drain_all(), vec![1, 2]);
    }

    #[test]
    fn test_push_wakes_waiter() {
        let signal = Arc::new(DrainSignal::new());
        let buffer = Arc::new(StreamBuffer::new(
            PacketKind::Event,
            BufferSettings::default(),
            signal.clone(),
        ));

        let producer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                buffer.push(1u8);
            })
        };

        let start = Instant::now();
        let reason = signal.wait_for_data(Duration::from_secs(5));
        assert_eq!(reason, crate::WakeReason::Data);
        assert!(start.elapsed() < Duration::from_secs(5));
        producer.join().unwrap();
    }

    #[test]
    fn test_concurrent_pushes_all_visible() {
        let buffer = Arc::new(StreamBuffer::unbounded(PacketKind::Event));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        buffer.push(t * 1000 + i);
                    }
                })
            })
            .collect();

        let mut total = Vec::new();
        for handle in handles {
            handle.join().unwrap();
        }
        total.extend(buffer.drain_all());
        assert_eq!(total.len(), 4000);

        // 同一生产者内保持 FIFO
        let from_first: Vec<_> = total.iter().copied().filter(|v| *v < 1000).collect();
        assert!(from_first.windows(2).all(|w| w[0] < w[1]));
    }
}

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// 工作流使用的时钟抽象：所有等待与轮询都经由它完成。
///
/// - `now` 返回单调递增的时间（相对时钟创建时刻）。
/// - `sleep` 阻塞当前线程；测试中可替换为 `ManualClock`，只推进虚拟时间。
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

/// 基于 `Instant` 与 `thread::sleep` 的真实时钟。
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// 虚拟时钟：`sleep` 立即返回并推进内部时间，用于回放固定画面的工作流。
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 手动推进时间（不计入 `total_slept`）。
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    /// 累计被 `sleep` 消耗的虚拟时间。
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.slept.set(self.slept.get() + duration);
    }
}

/// 让 `Rc<ManualClock>` 之类的共享句柄也能直接作为时钟注入引擎。
impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

use crate::clock::Clock;
use std::time::Duration;

/// 单次 `tick` 之后的轮询状态。
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Polling,
    Matched(T),
    TimedOut(Duration),
}

/// 轮询的终态。
#[derive(Debug, Clone, PartialEq)]
pub enum Waited<T> {
    Matched(T),
    TimedOut(Duration),
}

/// 按固定间隔反复探测，直到条件满足或超时。
///
/// 至少探测一次（超时为 0 时也一样）；每次等待不会越过截止时间。
pub struct Poller<'c> {
    clock: &'c dyn Clock,
    started: Duration,
    timeout: Duration,
    interval: Duration,
    attempts: u32,
}

impl<'c> Poller<'c> {
    pub fn new(clock: &'c dyn Clock, timeout: Duration, interval: Duration) -> Self {
        Self {
            clock,
            started: clock.now(),
            timeout,
            interval,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// 消化一次探测结果，未命中且未超时则睡眠一个间隔。
    pub fn tick<T>(&mut self, probe: Option<T>) -> PollState<T> {
        self.attempts += 1;
        if let Some(v) = probe {
            return PollState::Matched(v);
        }
        let elapsed = self.elapsed();
        if elapsed >= self.timeout {
            return PollState::TimedOut(elapsed);
        }
        let remaining = self.timeout - elapsed;
        // 间隔为 0 时退化为忙等，至少让出 1ms
        let pause = self.interval.max(Duration::from_millis(1)).min(remaining);
        self.clock.sleep(pause);
        PollState::Polling
    }

    pub fn run<T>(&mut self, mut probe: impl FnMut() -> Option<T>) -> Waited<T> {
        loop {
            match self.tick(probe()) {
                PollState::Polling => continue,
                PollState::Matched(v) => return Waited::Matched(v),
                PollState::TimedOut(elapsed) => return Waited::TimedOut(elapsed),
            }
        }
    }
}

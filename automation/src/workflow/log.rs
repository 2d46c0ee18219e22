use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// 以浮点秒序列化时长。
pub(crate) fn secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// log_message 写入的计时标记。
    Marker,
    Succeeded,
    Failed,
    TimedOut,
    /// retry_action 的一次失败尝试。
    Retry,
    /// 必需步骤失败，工作流在此终止。
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// 距本次运行开始的单调时长。
    #[serde(rename = "elapsed", serialize_with = "secs")]
    pub at: Duration,
    pub timestamp: DateTime<Local>,
    pub kind: EntryKind,
    pub step: Option<usize>,
    pub detail: String,
}

/// 一次运行的有序执行日志，只追加。
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionLog {
    started_at: DateTime<Local>,
    #[serde(skip)]
    origin: Duration,
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    /// `origin` 为运行开始时的时钟读数，`started_at` 为同一时刻的墙钟时间。
    pub fn new(started_at: DateTime<Local>, origin: Duration) -> Self {
        Self {
            started_at,
            origin,
            entries: Vec::new(),
        }
    }

    /// 追加一条记录。时间戳由墙钟起点加单调偏移得到，因此不会倒退。
    pub fn push(&mut self, now: Duration, kind: EntryKind, step: Option<usize>, detail: String) {
        let at = now.saturating_sub(self.origin);
        let offset = chrono::Duration::from_std(at).unwrap_or_else(|_| chrono::Duration::zero());
        self.entries.push(LogEntry {
            at,
            timestamp: self.started_at + offset,
            kind,
            step,
            detail,
        });
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn markers(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Marker)
    }

    /// 第一条内容为 `message` 的标记。
    pub fn marker(&self, message: &str) -> Option<&LogEntry> {
        self.markers().find(|e| e.detail == message)
    }

    /// 从第一个 `start` 标记到最后一个 `end` 标记的时长；任一缺失或顺序颠倒时为 `None`。
    pub fn elapsed_between(&self, start: &str, end: &str) -> Option<Duration> {
        let start = self.marker(start)?.at;
        let end = self.markers().filter(|e| e.detail == end).last()?.at;
        end.checked_sub(start)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

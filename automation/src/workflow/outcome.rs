use super::Point;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 单个步骤的执行结果。
///
/// 处理器从不直接终止工作流：是否继续只由引擎根据结果与 `optional` 决定。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { payload: Payload },
    Failure { reason: String },
    TimedOut {
        #[serde(serialize_with = "super::log::secs")]
        elapsed: Duration,
        waiting_for: String,
    },
}

impl StepOutcome {
    pub fn success(payload: Payload) -> Self {
        StepOutcome::Success { payload }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        StepOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn timed_out(elapsed: Duration, waiting_for: impl Into<String>) -> Self {
        StepOutcome::TimedOut {
            elapsed,
            waiting_for: waiting_for.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            StepOutcome::Success { payload } => Some(payload),
            _ => None,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Success { payload } => write!(f, "成功: {payload}"),
            StepOutcome::Failure { reason } => write!(f, "失败: {reason}"),
            StepOutcome::TimedOut {
                elapsed,
                waiting_for,
            } => write!(f, "超时 ({:.1}s): {waiting_for}", elapsed.as_secs_f64()),
        }
    }
}

/// 成功结果附带的信息。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Done,
    /// 条件未满足但按约定视为成功（如目标不存在时的 click_template_if_exists）。
    Skipped { reason: String },
    Matched {
        template: String,
        location: Point,
        confidence: f64,
    },
    Clicked {
        template: String,
        location: Point,
        confidence: f64,
    },
    Checked {
        template: String,
        present: bool,
        confidence: f64,
    },
    Vanished { template: String },
    ScreenChanged { similarity: f64 },
    Screenshot { path: PathBuf },
    Marker { message: String },
    GameRunning { process: String },
    GameExited { process: String, found: bool },
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Done => f.write_str("完成"),
            Payload::Skipped { reason } => write!(f, "跳过 ({reason})"),
            Payload::Matched {
                template,
                location,
                confidence,
            } => write!(f, "{template} 位于 {location} (置信度 {confidence:.3})"),
            Payload::Clicked {
                template,
                location,
                confidence,
            } => write!(f, "点击 {template} 于 {location} (置信度 {confidence:.3})"),
            Payload::Checked {
                template,
                present,
                confidence,
            } => write!(
                f,
                "{template} {} (置信度 {confidence:.3})",
                if *present { "存在" } else { "不存在" }
            ),
            Payload::Vanished { template } => write!(f, "{template} 已消失"),
            Payload::ScreenChanged { similarity } => {
                write!(f, "画面已变化 (相似度 {similarity:.3})")
            }
            Payload::Screenshot { path } => write!(f, "截图已保存 {}", path.display()),
            Payload::Marker { message } => f.write_str(message),
            Payload::GameRunning { process } => write!(f, "{process} 正在运行"),
            Payload::GameExited { process, found } => {
                if *found {
                    write!(f, "{process} 已结束")
                } else {
                    write!(f, "{process} 未在运行")
                }
            }
        }
    }
}

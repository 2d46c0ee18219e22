use super::Handler;
use crate::workflow::context::secs;
use crate::workflow::step::{Params, check_secs};
use crate::workflow::{Payload, Session, StepOutcome};
use anyhow::Result;
use serde::Deserialize;

const DEFAULT_WAIT_SECS: f64 = 1.0;
const DEFAULT_MARKER: &str = "LOG_MESSAGE";

/// 固定等待。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wait {
    #[serde(default)]
    pub seconds: Option<f64>,
}

impl Params for Wait {
    fn validate(&self) -> Result<(), String> {
        check_secs("seconds", self.seconds)
    }
}

impl Handler for Wait {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        cx.sleep(secs(self.seconds.unwrap_or(DEFAULT_WAIT_SECS)));
        Ok(StepOutcome::success(Payload::Done))
    }
}

/// 写入计时标记，例如 `BENCHMARK_START_TIME` / `BENCHMARK_END_TIME`。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogMessage {
    #[serde(default)]
    pub message: Option<String>,
}

impl Params for LogMessage {}

impl Handler for LogMessage {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let message = self.message.as_deref().unwrap_or(DEFAULT_MARKER);
        cx.mark(message);
        Ok(StepOutcome::success(Payload::Marker {
            message: message.to_string(),
        }))
    }
}

use super::{Handler, dispatch};
use crate::workflow::step::{Params, check_secs};
use crate::workflow::{EntryKind, Session, Step, StepOutcome};
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// 为一个子步骤提供重试：最多执行 `max_retries` 次，两次尝试之间等待 `retry_delay`。
///
/// - 首次成功即返回，并执行子步骤自己的 `step_delay`。
/// - 全部失败时返回最后一次的结果。子步骤自己的 `optional` 不起作用，要容忍失败需标记外层步骤。
#[derive(Debug, Clone)]
pub struct RetryAction {
    pub step: Box<Step>,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// 加载阶段的原始参数，`action_to_retry` 之后再按步骤递归解析。
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRetry {
    pub action_to_retry: serde_yaml::Value,
    #[serde(default = "default_attempts")]
    pub max_retries: u32,
    #[serde(default = "default_delay")]
    pub retry_delay: f64,
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> f64 {
    1.0
}

impl Params for RawRetry {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("`max_retries` 至少为 1".into());
        }
        check_secs("retry_delay", Some(self.retry_delay))
    }
}

impl Handler for RetryAction {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let kind = self.step.kind();
        let attempts = self.max_retries.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            let outcome = dispatch(&self.step.action, cx);
            if outcome.is_success() {
                if attempt > 1 {
                    info!(%kind, attempt, "重试成功");
                }
                cx.sleep(self.step.step_delay);
                return Ok(outcome);
            }

            warn!(%kind, attempt, attempts, "尝试失败: {outcome}");
            cx.record(
                EntryKind::Retry,
                format!("{kind} 第 {attempt}/{attempts} 次尝试: {outcome}"),
            );
            if attempt < attempts {
                cx.sleep(self.retry_delay);
            }
            last = Some(outcome);
        }

        Ok(last.unwrap_or_else(|| StepOutcome::failure(format!("{kind} 未执行"))))
    }
}

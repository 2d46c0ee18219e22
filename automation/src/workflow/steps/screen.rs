use super::Handler;
use crate::vision::Waited;
use crate::workflow::step::{Params, check_not_blank, check_secs, check_threshold};
use crate::workflow::{Payload, Region, Session, StepOutcome};
use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// 截图并保存，文件名为 `<name>_<序号>`。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TakeScreenshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
}

impl Params for TakeScreenshot {
    fn validate(&self) -> Result<(), String> {
        match &self.name {
            Some(n) => check_not_blank("name", n),
            None => Ok(()),
        }
    }
}

impl Handler for TakeScreenshot {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let frame = cx.capture(self.region.as_ref())?;
        let name = cx.next_screenshot_name(self.name.as_deref());
        let path = cx.save_screenshot(&name, &frame)?;
        info!(path = %path.display(), "截图已保存");
        Ok(StepOutcome::success(Payload::Screenshot { path }))
    }
}

/// 画面变化判定的默认相似度阈值。
const SCREEN_CHANGE_THRESHOLD: f64 = 0.95;

/// 等待画面相对起始帧发生变化（相似度低于 `threshold`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForScreenChange {
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Params for WaitForScreenChange {
    fn validate(&self) -> Result<(), String> {
        check_secs("timeout", self.timeout)?;
        check_threshold(self.threshold)
    }
}

impl Handler for WaitForScreenChange {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = self.threshold.unwrap_or(SCREEN_CHANGE_THRESHOLD);
        let timeout = cx.wait_timeout(self.timeout);
        info!(threshold, "等待画面变化");
        Ok(
            match cx.wait_until_changed(self.region.as_ref(), threshold, timeout)? {
                Waited::Matched(similarity) => {
                    StepOutcome::success(Payload::ScreenChanged { similarity })
                }
                Waited::TimedOut(elapsed) => StepOutcome::timed_out(
                    elapsed,
                    format!("画面变化 (相似度 < {threshold:.3})"),
                ),
            },
        )
    }
}

use super::Handler;
use crate::vision::{Match, Waited};
use crate::workflow::context::secs;
use crate::workflow::step::{Params, check_not_blank, check_offset, check_secs, check_threshold};
use crate::workflow::{MouseButton, Payload, Region, Session, StepOutcome};
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// 点击时序：移动 -> 点击前等待 -> 点击 -> 点击后等待。
struct ClickTiming {
    move_duration: Duration,
    pre: Duration,
    post: Duration,
}

impl ClickTiming {
    fn resolve(cx: &Session<'_>, move_duration: Option<f64>, pre: Option<f64>, post: Option<f64>) -> Self {
        let s = cx.settings();
        Self {
            move_duration: secs(move_duration.unwrap_or(s.mouse_move_duration)),
            pre: secs(pre.unwrap_or(s.pre_click_delay)),
            post: secs(post.unwrap_or(s.post_click_delay)),
        }
    }
}

fn click_match(
    cx: &mut Session<'_>,
    template: &str,
    m: Match,
    offset: Option<(i32, i32)>,
    button: MouseButton,
    timing: &ClickTiming,
) -> Result<Payload> {
    let target = m.location.offset(offset.unwrap_or((0, 0)));
    info!(template, %target, %button, confidence = m.confidence, "点击模板");
    cx.input().move_to(target, timing.move_duration)?;
    cx.sleep(timing.pre);
    cx.input().click(button)?;
    cx.sleep(timing.post);
    Ok(Payload::Clicked {
        template: template.to_string(),
        location: target,
        confidence: m.confidence,
    })
}

/// 等待模板出现后点击其中心（可加像素偏移）。
///
/// 超时缺省取配置 `click_timeout`，而不是通用等待的 `timeout`。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickTemplate {
    pub template: String,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub offset: Option<(i32, i32)>,
    #[serde(default)]
    pub move_duration: Option<f64>,
    #[serde(default)]
    pub pre_click_delay: Option<f64>,
    #[serde(default)]
    pub post_click_delay: Option<f64>,
}

impl Params for ClickTemplate {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("template", &self.template)?;
        check_secs("timeout", self.timeout)?;
        check_secs("move_duration", self.move_duration)?;
        check_secs("pre_click_delay", self.pre_click_delay)?;
        check_secs("post_click_delay", self.post_click_delay)?;
        check_offset(self.offset)?;
        check_threshold(self.threshold)
    }
}

impl Handler for ClickTemplate {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let timeout = cx.click_timeout(self.timeout);
        let timing = ClickTiming::resolve(
            cx,
            self.move_duration,
            self.pre_click_delay,
            self.post_click_delay,
        );

        let waited =
            cx.wait_until_present(&self.template, self.region.as_ref(), threshold, timeout)?;
        match waited {
            Waited::Matched(m) => {
                let payload = click_match(cx, &self.template, m, self.offset, self.button, &timing)?;
                Ok(StepOutcome::success(payload))
            }
            Waited::TimedOut(elapsed) => Ok(StepOutcome::timed_out(
                elapsed,
                format!("可点击的 {} (>= {threshold:.3})", self.template),
            )),
        }
    }
}

/// 模板存在则点击，不存在或模板文件无法加载都视为成功（不做任何输入）。只检查一次，不等待。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickTemplateIfExists {
    pub template: String,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub offset: Option<(i32, i32)>,
}

impl Params for ClickTemplateIfExists {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("template", &self.template)?;
        check_offset(self.offset)?;
        check_threshold(self.threshold)
    }
}

impl Handler for ClickTemplateIfExists {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let template = match cx.template(&self.template) {
            Ok(t) => t,
            Err(e) => {
                warn!(template = %self.template, "模板无法加载，跳过点击: {e:#}");
                return Ok(StepOutcome::success(Payload::Skipped {
                    reason: format!("{} 无法加载: {e:#}", self.template),
                }));
            }
        };
        let m = cx.probe(&template, self.region.as_ref())?;
        if m.confidence < threshold {
            info!(template = %self.template, confidence = m.confidence, "模板不存在，跳过点击");
            return Ok(StepOutcome::success(Payload::Skipped {
                reason: format!(
                    "{} 不存在 (置信度 {:.3} < {threshold:.3})",
                    self.template, m.confidence
                ),
            }));
        }
        let timing = ClickTiming::resolve(cx, None, None, None);
        let payload = click_match(cx, &self.template, m, self.offset, self.button, &timing)?;
        Ok(StepOutcome::success(payload))
    }
}

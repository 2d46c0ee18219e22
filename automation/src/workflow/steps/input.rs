use super::Handler;
use crate::workflow::context::secs;
use crate::workflow::step::{Params, check_not_blank, check_secs};
use crate::workflow::{MouseButton, Payload, Point, Session, StepOutcome};
use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// 按一次键，之后等待 `delay`（缺省取配置 `input_delay`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PressKey {
    pub key: String,
    #[serde(default)]
    pub delay: Option<f64>,
}

impl Params for PressKey {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("key", &self.key)?;
        check_secs("delay", self.delay)
    }
}

impl Handler for PressKey {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        info!(key = %self.key, "按键");
        cx.input().press_key(&self.key)?;
        let delay = secs(self.delay.unwrap_or(cx.settings().input_delay));
        cx.sleep(delay);
        Ok(StepOutcome::success(Payload::Done))
    }
}

/// 按住键 `duration` 秒后释放。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldKey {
    pub key: String,
    #[serde(default = "default_hold")]
    pub duration: f64,
}

fn default_hold() -> f64 {
    1.0
}

impl Params for HoldKey {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("key", &self.key)?;
        check_secs("duration", Some(self.duration))
    }
}

impl Handler for HoldKey {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        info!(key = %self.key, secs = self.duration, "按住");
        cx.input().key_down(&self.key)?;
        cx.sleep(secs(self.duration));
        cx.input().key_up(&self.key)?;
        Ok(StepOutcome::success(Payload::Done))
    }
}

/// 输入一段文本，之后等待 `delay`（缺省取配置 `input_delay`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeText {
    pub text: String,
    #[serde(default)]
    pub delay: Option<f64>,
}

impl Params for TypeText {
    fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("`text` 不能为空".into());
        }
        check_secs("delay", self.delay)
    }
}

impl Handler for TypeText {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        info!(chars = self.text.chars().count(), "输入文本");
        cx.input().type_text(&self.text)?;
        let delay = secs(self.delay.unwrap_or(cx.settings().input_delay));
        cx.sleep(delay);
        Ok(StepOutcome::success(Payload::Done))
    }
}

/// 在屏幕绝对坐标处点击，之后等待 `delay`（缺省取配置 `post_click_delay`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Click {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub delay: Option<f64>,
}

impl Params for Click {
    fn validate(&self) -> Result<(), String> {
        check_secs("delay", self.delay)
    }
}

impl Handler for Click {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let target = Point::new(self.x, self.y);
        info!(%target, button = %self.button, "点击坐标");
        let move_duration = secs(cx.settings().mouse_move_duration);
        cx.input().move_to(target, move_duration)?;
        cx.input().click(self.button)?;
        let delay = secs(self.delay.unwrap_or(cx.settings().post_click_delay));
        cx.sleep(delay);
        Ok(StepOutcome::success(Payload::Done))
    }
}

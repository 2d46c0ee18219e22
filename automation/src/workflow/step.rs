use super::steps::{
    CheckTemplate, Click, ClickTemplate, ClickTemplateIfExists, ExitGame, HoldKey, LaunchGame,
    LogMessage, PressKey, RawRetry, RetryAction, TakeScreenshot, TypeText, Wait, WaitForAnyTemplate,
    WaitForGame, WaitForScreenChange, WaitForTemplate, WaitForTemplateDisappear,
};
use crate::error::LoadError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 动作种类：封闭枚举，与工作流文件中的 `action` 字符串一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    LaunchGame,
    WaitForGame,
    ExitGame,
    WaitForTemplate,
    WaitForAnyTemplate,
    WaitForTemplateDisappear,
    ClickTemplate,
    ClickTemplateIfExists,
    CheckTemplate,
    PressKey,
    HoldKey,
    TypeText,
    Click,
    TakeScreenshot,
    WaitForScreenChange,
    Wait,
    LogMessage,
    RetryAction,
}

impl ActionKind {
    pub const ALL: [ActionKind; 18] = [
        ActionKind::LaunchGame,
        ActionKind::WaitForGame,
        ActionKind::ExitGame,
        ActionKind::WaitForTemplate,
        ActionKind::WaitForAnyTemplate,
        ActionKind::WaitForTemplateDisappear,
        ActionKind::ClickTemplate,
        ActionKind::ClickTemplateIfExists,
        ActionKind::CheckTemplate,
        ActionKind::PressKey,
        ActionKind::HoldKey,
        ActionKind::TypeText,
        ActionKind::Click,
        ActionKind::TakeScreenshot,
        ActionKind::WaitForScreenChange,
        ActionKind::Wait,
        ActionKind::LogMessage,
        ActionKind::RetryAction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::LaunchGame => "launch_game",
            ActionKind::WaitForGame => "wait_for_game",
            ActionKind::ExitGame => "exit_game",
            ActionKind::WaitForTemplate => "wait_for_template",
            ActionKind::WaitForAnyTemplate => "wait_for_any_template",
            ActionKind::WaitForTemplateDisappear => "wait_for_template_disappear",
            ActionKind::ClickTemplate => "click_template",
            ActionKind::ClickTemplateIfExists => "click_template_if_exists",
            ActionKind::CheckTemplate => "check_template",
            ActionKind::PressKey => "press_key",
            ActionKind::HoldKey => "hold_key",
            ActionKind::TypeText => "type_text",
            ActionKind::Click => "click",
            ActionKind::TakeScreenshot => "take_screenshot",
            ActionKind::WaitForScreenChange => "wait_for_screen_change",
            ActionKind::Wait => "wait",
            ActionKind::LogMessage => "log_message",
            ActionKind::RetryAction => "retry_action",
        }
    }

    /// 加载时必须出现的参数。
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            ActionKind::WaitForTemplate
            | ActionKind::WaitForTemplateDisappear
            | ActionKind::ClickTemplate
            | ActionKind::ClickTemplateIfExists
            | ActionKind::CheckTemplate => &["template"],
            ActionKind::WaitForAnyTemplate => &["templates"],
            ActionKind::PressKey | ActionKind::HoldKey => &["key"],
            ActionKind::TypeText => &["text"],
            ActionKind::Click => &["x", "y"],
            ActionKind::RetryAction => &["action_to_retry"],
            ActionKind::LaunchGame
            | ActionKind::WaitForGame
            | ActionKind::ExitGame
            | ActionKind::TakeScreenshot
            | ActionKind::WaitForScreenChange
            | ActionKind::Wait
            | ActionKind::LogMessage => &[],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// 一个动作及其已校验的参数。每个变体对应一种 `ActionKind`。
#[derive(Debug, Clone)]
pub enum Action {
    LaunchGame(LaunchGame),
    WaitForGame(WaitForGame),
    ExitGame(ExitGame),
    WaitForTemplate(WaitForTemplate),
    WaitForAnyTemplate(WaitForAnyTemplate),
    WaitForTemplateDisappear(WaitForTemplateDisappear),
    ClickTemplate(ClickTemplate),
    ClickTemplateIfExists(ClickTemplateIfExists),
    CheckTemplate(CheckTemplate),
    PressKey(PressKey),
    HoldKey(HoldKey),
    TypeText(TypeText),
    Click(Click),
    TakeScreenshot(TakeScreenshot),
    WaitForScreenChange(WaitForScreenChange),
    Wait(Wait),
    LogMessage(LogMessage),
    RetryAction(RetryAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::LaunchGame(_) => ActionKind::LaunchGame,
            Action::WaitForGame(_) => ActionKind::WaitForGame,
            Action::ExitGame(_) => ActionKind::ExitGame,
            Action::WaitForTemplate(_) => ActionKind::WaitForTemplate,
            Action::WaitForAnyTemplate(_) => ActionKind::WaitForAnyTemplate,
            Action::WaitForTemplateDisappear(_) => ActionKind::WaitForTemplateDisappear,
            Action::ClickTemplate(_) => ActionKind::ClickTemplate,
            Action::ClickTemplateIfExists(_) => ActionKind::ClickTemplateIfExists,
            Action::CheckTemplate(_) => ActionKind::CheckTemplate,
            Action::PressKey(_) => ActionKind::PressKey,
            Action::HoldKey(_) => ActionKind::HoldKey,
            Action::TypeText(_) => ActionKind::TypeText,
            Action::Click(_) => ActionKind::Click,
            Action::TakeScreenshot(_) => ActionKind::TakeScreenshot,
            Action::WaitForScreenChange(_) => ActionKind::WaitForScreenChange,
            Action::Wait(_) => ActionKind::Wait,
            Action::LogMessage(_) => ActionKind::LogMessage,
            Action::RetryAction(_) => ActionKind::RetryAction,
        }
    }

    /// 该动作（含被重试的子步骤）引用的模板名。
    pub fn templates(&self) -> Vec<&str> {
        match self {
            Action::WaitForTemplate(a) => vec![a.template.as_str()],
            Action::WaitForTemplateDisappear(a) => vec![a.template.as_str()],
            Action::ClickTemplate(a) => vec![a.template.as_str()],
            Action::ClickTemplateIfExists(a) => vec![a.template.as_str()],
            Action::CheckTemplate(a) => vec![a.template.as_str()],
            Action::WaitForAnyTemplate(a) => a.templates.iter().map(String::as_str).collect(),
            Action::RetryAction(a) => a.step.action.templates(),
            _ => Vec::new(),
        }
    }

    fn from_params(index: usize, kind: ActionKind, params: Mapping) -> Result<Self, LoadError> {
        let action = match kind {
            ActionKind::LaunchGame => Action::LaunchGame(parse_params(index, kind, params)?),
            ActionKind::WaitForGame => Action::WaitForGame(parse_params(index, kind, params)?),
            ActionKind::ExitGame => Action::ExitGame(parse_params(index, kind, params)?),
            ActionKind::WaitForTemplate => {
                Action::WaitForTemplate(parse_params(index, kind, params)?)
            }
            ActionKind::WaitForAnyTemplate => {
                Action::WaitForAnyTemplate(parse_params(index, kind, params)?)
            }
            ActionKind::WaitForTemplateDisappear => {
                Action::WaitForTemplateDisappear(parse_params(index, kind, params)?)
            }
            ActionKind::ClickTemplate => Action::ClickTemplate(parse_params(index, kind, params)?),
            ActionKind::ClickTemplateIfExists => {
                Action::ClickTemplateIfExists(parse_params(index, kind, params)?)
            }
            ActionKind::CheckTemplate => Action::CheckTemplate(parse_params(index, kind, params)?),
            ActionKind::PressKey => Action::PressKey(parse_params(index, kind, params)?),
            ActionKind::HoldKey => Action::HoldKey(parse_params(index, kind, params)?),
            ActionKind::TypeText => Action::TypeText(parse_params(index, kind, params)?),
            ActionKind::Click => Action::Click(parse_params(index, kind, params)?),
            ActionKind::TakeScreenshot => {
                Action::TakeScreenshot(parse_params(index, kind, params)?)
            }
            ActionKind::WaitForScreenChange => {
                Action::WaitForScreenChange(parse_params(index, kind, params)?)
            }
            ActionKind::Wait => Action::Wait(parse_params(index, kind, params)?),
            ActionKind::LogMessage => Action::LogMessage(parse_params(index, kind, params)?),
            ActionKind::RetryAction => {
                let raw: RawRetry = parse_params(index, kind, params)?;
                let step = parse_step_inner(index, raw.action_to_retry, true)?;
                Action::RetryAction(RetryAction {
                    step: Box::new(step),
                    max_retries: raw.max_retries,
                    retry_delay: super::context::secs(raw.retry_delay),
                })
            }
        };
        Ok(action)
    }
}

/// 工作流中的一个步骤：动作 + 两个通用修饰符。
#[derive(Debug, Clone)]
pub struct Step {
    pub action: Action,
    /// 为 true 时失败/超时只记录，不终止工作流。
    pub optional: bool,
    /// 成功后追加的等待。
    pub step_delay: Duration,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            optional: false,
            step_delay: Duration::ZERO,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// 每种动作参数结构的公共约束：可反序列化，并在加载时做取值校验。
pub(crate) trait Params: DeserializeOwned {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn parse_params<T: Params>(index: usize, kind: ActionKind, params: Mapping) -> Result<T, LoadError> {
    let invalid = |message: String| LoadError::InvalidParameter {
        index,
        action: kind,
        message,
    };
    let parsed: T = serde_yaml::from_value(Value::Mapping(params)).map_err(|e| invalid(e.to_string()))?;
    parsed.validate().map_err(invalid)?;
    Ok(parsed)
}

/// 解析工作流中第 `index` 个步骤。
pub fn parse_step(index: usize, value: Value) -> Result<Step, LoadError> {
    parse_step_inner(index, value, false)
}

fn parse_step_inner(index: usize, value: Value, nested: bool) -> Result<Step, LoadError> {
    let Value::Mapping(mut map) = value else {
        return Err(LoadError::NotAMapping { index });
    };

    let action = match map.remove("action") {
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(LoadError::UnknownAction {
                index,
                action: format!("{other:?}"),
            });
        }
        None => return Err(LoadError::MissingAction { index }),
    };
    let kind: ActionKind = action
        .parse()
        .map_err(|_| LoadError::UnknownAction { index, action })?;

    if nested && kind == ActionKind::RetryAction {
        return Err(LoadError::NestedRetry { index });
    }

    let invalid = |message: String| LoadError::InvalidParameter {
        index,
        action: kind,
        message,
    };

    let optional = match map.remove("optional") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(other) => return Err(invalid(format!("`optional` 必须是布尔值，实际为 {other:?}"))),
    };
    let step_delay = match map.remove("step_delay") {
        None | Some(Value::Null) => Duration::ZERO,
        Some(Value::Number(n)) => {
            let secs = n.as_f64().unwrap_or(f64::NAN);
            non_negative_secs("step_delay", secs).map_err(invalid)?
        }
        Some(other) => return Err(invalid(format!("`step_delay` 必须是数字，实际为 {other:?}"))),
    };
    // 仅供阅读的注释字段
    map.remove("description");

    for param in kind.required_params() {
        if !map.contains_key(*param) {
            return Err(LoadError::MissingParameter {
                index,
                action: kind,
                param,
            });
        }
    }

    let action = Action::from_params(index, kind, map)?;
    Ok(Step {
        action,
        optional,
        step_delay,
    })
}

/// 校验时长参数（秒）：有限且非负。
pub(crate) fn non_negative_secs(name: &str, secs: f64) -> Result<Duration, String> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).map_err(|e| format!("`{name}` 超出范围: {e}"))
    } else {
        Err(format!("`{name}` 必须为非负秒数，实际为 {secs}"))
    }
}

pub(crate) fn check_secs(name: &str, secs: Option<f64>) -> Result<(), String> {
    match secs {
        Some(s) => non_negative_secs(name, s).map(|_| ()),
        None => Ok(()),
    }
}

pub(crate) fn check_threshold(threshold: Option<f64>) -> Result<(), String> {
    match threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => {
            Err(format!("`threshold` 必须位于 [0, 1]，实际为 {t}"))
        }
        _ => Ok(()),
    }
}

/// 点击偏移的绝对值上限（像素）。
const MAX_OFFSET: u32 = 100_000;

pub(crate) fn check_offset(offset: Option<(i32, i32)>) -> Result<(), String> {
    let Some((dx, dy)) = offset else {
        return Ok(());
    };
    if dx.unsigned_abs() > MAX_OFFSET || dy.unsigned_abs() > MAX_OFFSET {
        return Err(format!(
            "`offset` 每个分量必须位于 ±{MAX_OFFSET} 像素内，实际为 [{dx}, {dy}]"
        ));
    }
    Ok(())
}

pub(crate) fn check_not_blank(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{name}` 不能为空"))
    } else {
        Ok(())
    }
}

use super::{Action, Session, StepOutcome};
use anyhow::Result;

mod click;
mod flow;
mod game;
mod input;
mod retry;
mod screen;
mod template;

pub use click::{ClickTemplate, ClickTemplateIfExists};
pub use flow::{LogMessage, Wait};
pub use game::{ExitGame, LaunchGame, WaitForGame};
pub use input::{Click, HoldKey, PressKey, TypeText};
pub(crate) use retry::RawRetry;
pub use retry::RetryAction;
pub use screen::{TakeScreenshot, WaitForScreenChange};
pub use template::{CheckTemplate, WaitForAnyTemplate, WaitForTemplate, WaitForTemplateDisappear};

/// 所有动作处理器的统一接口。
///
/// - 处理器只返回结果，从不决定工作流是否继续（那是引擎的策略）。
/// - 设备或模板错误以 `Err` 返回，由 `dispatch` 统一转换为 `Failure`。
/// - 超时以 `Ok(StepOutcome::TimedOut)` 返回，与普通失败区分。
pub(crate) trait Handler {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome>;
}

/// 将动作分派给对应处理器。
pub(crate) fn dispatch(action: &Action, cx: &mut Session<'_>) -> StepOutcome {
    let result = match action {
        Action::LaunchGame(a) => a.run(cx),
        Action::WaitForGame(a) => a.run(cx),
        Action::ExitGame(a) => a.run(cx),
        Action::WaitForTemplate(a) => a.run(cx),
        Action::WaitForAnyTemplate(a) => a.run(cx),
        Action::WaitForTemplateDisappear(a) => a.run(cx),
        Action::ClickTemplate(a) => a.run(cx),
        Action::ClickTemplateIfExists(a) => a.run(cx),
        Action::CheckTemplate(a) => a.run(cx),
        Action::PressKey(a) => a.run(cx),
        Action::HoldKey(a) => a.run(cx),
        Action::TypeText(a) => a.run(cx),
        Action::Click(a) => a.run(cx),
        Action::TakeScreenshot(a) => a.run(cx),
        Action::WaitForScreenChange(a) => a.run(cx),
        Action::Wait(a) => a.run(cx),
        Action::LogMessage(a) => a.run(cx),
        Action::RetryAction(a) => a.run(cx),
    };
    result.unwrap_or_else(|e| StepOutcome::failure(format!("{e:#}")))
}

use super::Handler;
use crate::vision::{Poller, Waited};
use crate::workflow::step::{Params, check_not_blank, check_secs};
use crate::workflow::{Payload, Session, StepOutcome};
use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing::{info, warn};

/// 步骤参数优先，其次是游戏定义中的进程名。
fn process_name(cx: &Session<'_>, step: Option<&str>) -> Result<String> {
    step.or(cx.game().default_process_name())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("未指定 process_name，游戏定义中也没有 process_name/exe_name"))
}

/// 启动游戏（Steam 或直接运行可执行文件）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchGame {}

impl Params for LaunchGame {}

impl Handler for LaunchGame {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let game = cx.game().clone();
        info!(game = %game.name, "启动游戏");
        cx.game_session().launch(&game)?;
        Ok(StepOutcome::success(Payload::Done))
    }
}

/// 等待游戏进程出现，按配置 `game_poll_interval` 检查。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForGame {
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub process_name: Option<String>,
}

impl Params for WaitForGame {
    fn validate(&self) -> Result<(), String> {
        if let Some(p) = &self.process_name {
            check_not_blank("process_name", p)?;
        }
        check_secs("timeout", self.timeout)
    }
}

impl Handler for WaitForGame {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let process = process_name(cx, self.process_name.as_deref())?;
        let timeout = cx.wait_timeout(self.timeout);
        info!(%process, timeout = timeout.as_secs_f64(), "等待游戏进程");

        let clock = cx.clock;
        let interval = cx.settings().game_poll_interval();
        let mut poller = Poller::new(clock, timeout, interval);
        let waited = poller.run(|| match cx.game_session().is_running(&process) {
            Ok(running) => running.then_some(()),
            Err(e) => {
                warn!(%process, "进程检查失败: {e:#}");
                None
            }
        });
        Ok(match waited {
            Waited::Matched(()) => StepOutcome::success(Payload::GameRunning { process }),
            Waited::TimedOut(elapsed) => {
                StepOutcome::timed_out(elapsed, format!("进程 {process} 启动"))
            }
        })
    }
}

/// 结束游戏进程，`force` 为真时强制结束。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitGame {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub process_name: Option<String>,
}

impl Params for ExitGame {
    fn validate(&self) -> Result<(), String> {
        match &self.process_name {
            Some(p) => check_not_blank("process_name", p),
            None => Ok(()),
        }
    }
}

impl Handler for ExitGame {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let process = process_name(cx, self.process_name.as_deref())?;
        info!(%process, force = self.force, "结束游戏进程");
        let found = cx.game_session().terminate(&process, self.force)?;
        Ok(StepOutcome::success(Payload::GameExited { process, found }))
    }
}

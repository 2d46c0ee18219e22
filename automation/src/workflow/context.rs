use super::{EntryKind, ExecutionLog, GameDefinition, Region};
use crate::capture::{Frame, FrameSource, ScreenshotStore};
use crate::clock::Clock;
use crate::config::Settings;
use crate::game::GameSession;
use crate::input::InputDriver;
use crate::vision::{Template, TemplateMatcher, TemplateNamespace};
use anyhow::Result;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// 引擎使用的全部外部设备。
pub struct Devices {
    pub frames: Box<dyn FrameSource>,
    pub matcher: Box<dyn TemplateMatcher>,
    pub input: Box<dyn InputDriver>,
    pub game: Box<dyn GameSession>,
    pub screenshots: Box<dyn ScreenshotStore>,
}

/// 秒数 -> `Duration`，负数或非有限值视为 0。
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

/// 一次运行期间所有处理器共享的会话状态。
///
/// 随 `run()` 创建、随其结束丢弃；持有设备的独占借用，因此同一时刻只有一个处理器在工作。
pub struct Session<'r> {
    settings: &'r Settings,
    game: &'r GameDefinition,
    pub(crate) devices: &'r mut Devices,
    pub(crate) clock: &'r dyn Clock,
    templates: TemplateNamespace,
    log: ExecutionLog,
    step: Option<usize>,
    screenshot_counter: u32,
}

impl<'r> Session<'r> {
    pub(crate) fn new(
        settings: &'r Settings,
        game: &'r GameDefinition,
        devices: &'r mut Devices,
        clock: &'r dyn Clock,
        templates: TemplateNamespace,
    ) -> Self {
        let log = ExecutionLog::new(chrono::Local::now(), clock.now());
        Self {
            settings,
            game,
            devices,
            clock,
            templates,
            log,
            step: None,
            screenshot_counter: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn game(&self) -> &GameDefinition {
        self.game
    }

    // 参数解析顺序：步骤 > 全局配置 > 内置默认（内置默认即 `Settings::default()` 的取值）

    pub fn threshold(&self, step: Option<f64>) -> f64 {
        step.unwrap_or(self.settings.template_matching_threshold)
    }

    pub fn wait_timeout(&self, step: Option<f64>) -> Duration {
        secs(step.unwrap_or(self.settings.timeout))
    }

    pub fn click_timeout(&self, step: Option<f64>) -> Duration {
        secs(step.unwrap_or(self.settings.click_timeout))
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }

    pub fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            debug!(secs = duration.as_secs_f64(), "sleep");
            self.clock.sleep(duration);
        }
    }

    pub fn template(&mut self, name: &str) -> Result<Rc<Template>> {
        self.templates.load(name)
    }

    pub fn capture(&mut self, region: Option<&Region>) -> Result<Frame> {
        self.devices.frames.capture(region)
    }

    pub fn input(&mut self) -> &mut dyn InputDriver {
        self.devices.input.as_mut()
    }

    pub fn game_session(&mut self) -> &mut dyn GameSession {
        self.devices.game.as_mut()
    }

    pub fn matcher(&self) -> &dyn TemplateMatcher {
        self.devices.matcher.as_ref()
    }

    /// 截图文件名：`<name>_<序号>`，序号在本次运行内递增。
    pub fn next_screenshot_name(&mut self, name: Option<&str>) -> String {
        self.screenshot_counter += 1;
        format!(
            "{}_{:03}",
            name.unwrap_or("screenshot"),
            self.screenshot_counter
        )
    }

    pub fn save_screenshot(&mut self, name: &str, frame: &Frame) -> Result<std::path::PathBuf> {
        self.devices.screenshots.save(name, frame)
    }

    pub(crate) fn enter_step(&mut self, index: usize) {
        self.step = Some(index);
    }

    pub fn record(&mut self, kind: EntryKind, detail: impl Into<String>) {
        self.log
            .push(self.clock.now(), kind, self.step, detail.into());
    }

    /// 写入计时标记，并以固定格式输出到日志，供外部工具解析。
    pub fn mark(&mut self, message: &str) {
        self.record(EntryKind::Marker, message);
        if let Some(entry) = self.log.entries().last() {
            let ts = entry.timestamp;
            info!(
                target: "gamebench::marker",
                "TIMING_MARKER: {message} at {:.6} ({})",
                ts.timestamp_micros() as f64 / 1_000_000.0,
                ts.format("%H:%M:%S")
            );
        }
    }

    pub(crate) fn into_log(self) -> ExecutionLog {
        self.log
    }
}

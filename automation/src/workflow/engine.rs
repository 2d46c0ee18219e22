use super::steps::dispatch;
use super::{ActionKind, Devices, EntryKind, ExecutionLog, Session, StepOutcome, Workflow};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::EngineError;
use crate::vision::{Template, TemplateNamespace};
use image::RgbaImage;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{error, info, info_span, warn};

/// 一次运行的最终状态。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// 第 `index`（0 起）个必需步骤失败，之后的步骤均未执行。
    Halted {
        index: usize,
        kind: ActionKind,
        outcome: StepOutcome,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub game: String,
    #[serde(flatten)]
    pub status: RunStatus,
    pub log: ExecutionLog,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// 运行期间置位，离开作用域时复位（包括 panic 展开）。
struct RunGuard<'a>(&'a Cell<bool>);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Result<Self, EngineError> {
        if flag.replace(true) {
            return Err(EngineError::AlreadyRunning);
        }
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// 工作流引擎：按顺序执行步骤，并统一应用 `optional` / `step_delay` 策略。
///
/// 单线程、同步执行；同一时刻只允许一个 `run()`，重入直接返回 `EngineError::AlreadyRunning`。
pub struct WorkflowEngine<'s> {
    settings: &'s Settings,
    devices: RefCell<Devices>,
    clock: Box<dyn Clock>,
    preloaded: Vec<Rc<Template>>,
    running: Cell<bool>,
}

impl<'s> WorkflowEngine<'s> {
    pub fn new(settings: &'s Settings, devices: Devices) -> Self {
        Self {
            settings,
            devices: RefCell::new(devices),
            clock: Box::new(SystemClock::new()),
            preloaded: Vec::new(),
            running: Cell::new(false),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// 预先注册内存中的模板，运行时优先于磁盘文件。
    pub fn with_template(mut self, name: impl Into<String>, image: RgbaImage) -> Self {
        self.preloaded.push(Rc::new(Template::new(name, image)));
        self
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// 本次运行使用的模板命名空间。
    pub fn templates_for(&self, workflow: &Workflow) -> TemplateNamespace {
        let mut ns = TemplateNamespace::new(&self.settings.templates_dir, workflow.game.slug());
        for t in &self.preloaded {
            ns.insert(Rc::clone(t));
        }
        ns
    }

    pub fn run(&self, workflow: &Workflow) -> Result<RunReport, EngineError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let mut devices = self
            .devices
            .try_borrow_mut()
            .map_err(|_| EngineError::AlreadyRunning)?;

        let span = info_span!("workflow", game = %workflow.game.name);
        let _enter = span.enter();
        info!(steps = workflow.steps.len(), "开始执行工作流");

        let templates = self.templates_for(workflow);
        let mut cx = Session::new(
            self.settings,
            &workflow.game,
            &mut *devices,
            self.clock.as_ref(),
            templates,
        );
        let mut status = RunStatus::Completed;

        for (index, step) in workflow.steps.iter().enumerate() {
            let kind = step.kind();
            let step_span = info_span!("step", index, %kind);
            let _step = step_span.enter();
            cx.enter_step(index);
            info!("[step {index:02}] {kind}");

            let outcome = dispatch(&step.action, &mut cx);
            match &outcome {
                StepOutcome::Success { payload } => {
                    info!("{payload}");
                    cx.record(EntryKind::Succeeded, format!("{kind}: {payload}"));
                    cx.sleep(step.step_delay);
                    continue;
                }
                StepOutcome::Failure { .. } => {
                    cx.record(EntryKind::Failed, format!("{kind}: {outcome}"));
                }
                StepOutcome::TimedOut { .. } => {
                    cx.record(EntryKind::TimedOut, format!("{kind}: {outcome}"));
                }
            }

            if step.optional {
                warn!("可选步骤未成功，继续执行: {outcome}");
                continue;
            }
            error!("必需步骤未成功，终止工作流: {outcome}");
            cx.record(
                EntryKind::Halted,
                format!("工作流终止于 step {index:02} ({kind})"),
            );
            status = RunStatus::Halted {
                index,
                kind,
                outcome,
            };
            break;
        }

        let log = cx.into_log();
        match &status {
            RunStatus::Completed => info!(entries = log.len(), "工作流完成"),
            RunStatus::Halted { index, .. } => error!(index, "工作流已终止"),
        }
        Ok(RunReport {
            game: workflow.game.name.clone(),
            status,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, FrameSource, ScreenshotStore};
    use crate::clock::ManualClock;
    use crate::game::GameSession;
    use crate::input::InputDriver;
    use crate::vision::{Hit, TemplateMatcher};
    use crate::workflow::{GameDefinition, MouseButton, Point, Region};
    use anyhow::{Result, bail};
    use std::path::PathBuf;
    use std::time::Duration;

    struct Blank;

    impl FrameSource for Blank {
        fn capture(&mut self, _: Option<&Region>) -> Result<Frame> {
            Ok(Frame::new(RgbaImage::new(4, 4), Point::new(0, 0)))
        }
    }

    impl TemplateMatcher for Blank {
        fn best_match(&self, _: &RgbaImage, _: &Template) -> Result<Option<Hit>> {
            Ok(None)
        }
        fn similarity(&self, _: &RgbaImage, _: &RgbaImage) -> Result<f64> {
            Ok(1.0)
        }
    }

    impl InputDriver for Blank {
        fn move_to(&mut self, _: Point, _: Duration) -> Result<()> {
            Ok(())
        }
        fn click(&mut self, _: MouseButton) -> Result<()> {
            Ok(())
        }
        fn press_key(&mut self, key: &str) -> Result<()> {
            bail!("no keyboard for {key}")
        }
        fn key_down(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
        fn key_up(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
        fn type_text(&mut self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    impl GameSession for Blank {
        fn launch(&mut self, _: &GameDefinition) -> Result<()> {
            Ok(())
        }
        fn is_running(&mut self, _: &str) -> Result<bool> {
            Ok(false)
        }
        fn terminate(&mut self, _: &str, _: bool) -> Result<bool> {
            Ok(false)
        }
    }

    impl ScreenshotStore for Blank {
        fn save(&mut self, name: &str, _: &Frame) -> Result<PathBuf> {
            Ok(PathBuf::from(name))
        }
    }

    fn devices() -> Devices {
        Devices {
            frames: Box::new(Blank),
            matcher: Box::new(Blank),
            input: Box::new(Blank),
            game: Box::new(Blank),
            screenshots: Box::new(Blank),
        }
    }

    fn workflow(yaml: &str) -> Workflow {
        Workflow::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn rejects_reentrant_run() {
        let settings = Settings::default();
        let engine = WorkflowEngine::new(&settings, devices()).with_clock(ManualClock::new());
        let wf = workflow("name: X");

        let _held = RunGuard::acquire(&engine.running).unwrap();
        assert_eq!(engine.run(&wf).unwrap_err(), EngineError::AlreadyRunning);
    }

    #[test]
    fn guard_is_released_after_run() -> Result<()> {
        let settings = Settings::default();
        let engine = WorkflowEngine::new(&settings, devices()).with_clock(ManualClock::new());
        let wf = workflow("name: X\nworkflow:\n  - action: wait\n    seconds: 0");
        assert!(engine.run(&wf)?.is_success());
        assert!(engine.run(&wf)?.is_success());
        Ok(())
    }

    #[test]
    fn handler_errors_become_failures() -> Result<()> {
        let settings = Settings::default();
        let engine = WorkflowEngine::new(&settings, devices()).with_clock(ManualClock::new());
        let wf = workflow("name: X\nworkflow:\n  - action: press_key\n    key: w");

        let report = engine.run(&wf)?;
        let RunStatus::Halted { index, kind, outcome } = &report.status else {
            panic!("expected halt, got {:?}", report.status);
        };
        assert_eq!((*index, *kind), (0, ActionKind::PressKey));
        assert_eq!(outcome, &StepOutcome::failure("no keyboard for w"));
        Ok(())
    }

    #[test]
    fn step_delay_follows_success_only() -> Result<()> {
        let settings = Settings::default();
        let clock = Rc::new(ManualClock::new());
        let engine = WorkflowEngine::new(&settings, devices()).with_clock(Rc::clone(&clock));
        let wf = workflow(
            r#"
name: X
workflow:
  - action: wait
    seconds: 1
    step_delay: 2
  - action: press_key
    key: q
    optional: true
    step_delay: 5
"#,
        );
        let report = engine.run(&wf)?;
        assert!(report.is_success());
        assert_eq!(clock.total_slept(), Duration::from_secs(3));
        Ok(())
    }

    #[test]
    fn missing_template_fails_the_step() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = Settings {
            templates_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let engine = WorkflowEngine::new(&settings, devices()).with_clock(ManualClock::new());
        let wf = workflow("name: X\nworkflow:\n  - action: wait_for_template\n    template: gone.png");

        let report = engine.run(&wf)?;
        let RunStatus::Halted { outcome, .. } = &report.status else {
            panic!("expected halt");
        };
        assert!(matches!(outcome, StepOutcome::Failure { reason } if reason.contains("gone.png")));
        Ok(())
    }
}

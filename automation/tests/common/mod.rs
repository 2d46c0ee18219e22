#![allow(dead_code)]

use anyhow::{Result, bail};
use gamebench::capture::{Frame, FrameSource, ScreenshotStore};
use gamebench::clock::ManualClock;
use gamebench::game::GameSession;
use gamebench::input::InputDriver;
use gamebench::vision::{Hit, Template, TemplateMatcher};
use gamebench::workflow::{GameDefinition, MouseButton, Point, Region, Workflow, WorkflowEngine};
use gamebench::{Devices, Settings};
use image::{Rgba, RgbaImage};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

pub const FRAME_W: u32 = 64;
pub const FRAME_H: u32 = 36;

/// 脚本化的屏幕与记录下来的全部设备调用。
#[derive(Default)]
pub struct State {
    /// 每个模板依次返回的置信度，最后一个值保持不变。
    pub scores: HashMap<String, VecDeque<f64>>,
    /// 模板中心在帧内的像素坐标。
    pub centers: HashMap<String, (u32, u32)>,
    pub similarities: VecDeque<f64>,
    pub fail_capture: bool,
    pub fail_keys: bool,
    /// `is_running` 在第几次检查时开始返回 true。
    pub running_from_check: Option<usize>,

    pub captures: usize,
    pub match_calls: HashMap<String, usize>,
    pub moves: Vec<(Point, Duration)>,
    pub clicks: Vec<MouseButton>,
    pub keys: Vec<String>,
    pub holds: Vec<(String, &'static str)>,
    pub typed: Vec<String>,
    pub screenshots: Vec<String>,
    pub launches: Vec<String>,
    pub running_checks: usize,
    pub terminated: Vec<(String, bool)>,
}

fn next_value(queue: &mut VecDeque<f64>, fallback: f64) -> f64 {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or(fallback)
    } else {
        queue.front().copied().unwrap_or(fallback)
    }
}

type Shared = Rc<RefCell<State>>;

struct FakeScreen(Shared);

impl FrameSource for FakeScreen {
    fn capture(&mut self, region: Option<&Region>) -> Result<Frame> {
        let mut s = self.0.borrow_mut();
        s.captures += 1;
        if s.fail_capture {
            bail!("capture device unavailable");
        }
        let frame = Frame::new(
            RgbaImage::from_pixel(FRAME_W, FRAME_H, Rgba([30, 30, 30, 255])),
            Point::new(0, 0),
        );
        Ok(match region {
            Some(r) => frame.crop(r),
            None => frame,
        })
    }
}

struct FakeMatcher(Shared);

impl TemplateMatcher for FakeMatcher {
    fn best_match(&self, _frame: &RgbaImage, template: &Template) -> Result<Option<Hit>> {
        let mut s = self.0.borrow_mut();
        *s.match_calls.entry(template.name.clone()).or_default() += 1;
        let center = s.centers.get(&template.name).copied().unwrap_or((5, 5));
        let confidence = match s.scores.get_mut(&template.name) {
            Some(q) => next_value(q, 0.0),
            None => 0.0,
        };
        Ok(Some(Hit { center, confidence }))
    }

    fn similarity(&self, _a: &RgbaImage, _b: &RgbaImage) -> Result<f64> {
        let mut s = self.0.borrow_mut();
        Ok(next_value(&mut s.similarities, 1.0))
    }
}

struct FakeInput(Shared);

impl InputDriver for FakeInput {
    fn move_to(&mut self, target: Point, duration: Duration) -> Result<()> {
        self.0.borrow_mut().moves.push((target, duration));
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.0.borrow_mut().clicks.push(button);
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        let mut s = self.0.borrow_mut();
        if s.fail_keys {
            bail!("key {key} rejected");
        }
        s.keys.push(key.to_string());
        Ok(())
    }

    fn key_down(&mut self, key: &str) -> Result<()> {
        self.0.borrow_mut().holds.push((key.to_string(), "down"));
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<()> {
        self.0.borrow_mut().holds.push((key.to_string(), "up"));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.0.borrow_mut().typed.push(text.to_string());
        Ok(())
    }
}

struct FakeGame(Shared);

impl GameSession for FakeGame {
    fn launch(&mut self, game: &GameDefinition) -> Result<()> {
        self.0.borrow_mut().launches.push(game.name.clone());
        Ok(())
    }

    fn is_running(&mut self, _process_name: &str) -> Result<bool> {
        let mut s = self.0.borrow_mut();
        s.running_checks += 1;
        Ok(s.running_from_check.is_some_and(|n| s.running_checks >= n))
    }

    fn terminate(&mut self, process_name: &str, force: bool) -> Result<bool> {
        self.0
            .borrow_mut()
            .terminated
            .push((process_name.to_string(), force));
        Ok(true)
    }
}

struct FakeStore(Shared);

impl ScreenshotStore for FakeStore {
    fn save(&mut self, name: &str, _frame: &Frame) -> Result<PathBuf> {
        self.0.borrow_mut().screenshots.push(name.to_string());
        Ok(PathBuf::from(format!("/shots/{name}.png")))
    }
}

/// 测试装置：共享状态 + 虚拟时钟 + 配置。
pub struct Rig {
    pub state: Shared,
    pub clock: Rc<ManualClock>,
    pub settings: Settings,
    templates: Vec<String>,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            state: Rc::default(),
            clock: Rc::new(ManualClock::new()),
            settings: Settings::default(),
            templates: Vec::new(),
        }
    }

    /// 注册一个内存模板，并指定它依次返回的置信度。
    pub fn score(&mut self, template: &str, scores: &[f64]) -> &mut Self {
        self.templates.push(template.to_string());
        self.state
            .borrow_mut()
            .scores
            .insert(template.to_string(), scores.iter().copied().collect());
        self
    }

    pub fn center(&mut self, template: &str, at: (u32, u32)) -> &mut Self {
        self.state
            .borrow_mut()
            .centers
            .insert(template.to_string(), at);
        self
    }

    pub fn devices(&self) -> Devices {
        Devices {
            frames: Box::new(FakeScreen(Rc::clone(&self.state))),
            matcher: Box::new(FakeMatcher(Rc::clone(&self.state))),
            input: Box::new(FakeInput(Rc::clone(&self.state))),
            game: Box::new(FakeGame(Rc::clone(&self.state))),
            screenshots: Box::new(FakeStore(Rc::clone(&self.state))),
        }
    }

    /// 使用虚拟时钟并注入全部已登记模板的引擎。
    pub fn engine(&self) -> WorkflowEngine<'_> {
        let mut engine =
            WorkflowEngine::new(&self.settings, self.devices()).with_clock(Rc::clone(&self.clock));
        for name in &self.templates {
            engine = engine.with_template(name.clone(), RgbaImage::new(4, 4));
        }
        engine
    }

    pub fn state(&self) -> Ref<'_, State> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, State> {
        self.state.borrow_mut()
    }

    pub fn elapsed(&self) -> Duration {
        use gamebench::clock::Clock;
        self.clock.now()
    }
}

pub fn workflow(yaml: &str) -> Workflow {
    Workflow::from_yaml_str(yaml).expect("test workflow must load")
}

mod common;

use anyhow::Result;
use common::Rig;
use gamebench::capture::{Frame, FrameSource};
use gamebench::vision::{CorrelationMatcher, TemplateNamespace};
use gamebench::workflow::{ActionKind, MouseButton, Point, Region, Workflow};
use gamebench::{Devices, LoadError, Settings};
use image::{Rgba, RgbaImage};
use std::fs;

const BENCH: &str = r#"
name: Demo Game
type: other
exe_name: demo.exe
install_dir: /games/demo
workflow:
  - action: launch_game
  - action: wait_for_game
    timeout: 60
  - action: log_message
    message: BENCHMARK_START_TIME
  - action: wait
    seconds: 30
    description: 跑图
  - action: log_message
    message: BENCHMARK_END_TIME
  - action: exit_game
"#;

#[test]
fn loads_workflow_from_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.yaml");
    fs::write(&path, BENCH)?;

    let wf = Workflow::load(&path)?;
    assert_eq!(wf.game.name, "Demo Game");
    let kinds: Vec<ActionKind> = wf.steps.iter().map(|s| s.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::LaunchGame,
            ActionKind::WaitForGame,
            ActionKind::LogMessage,
            ActionKind::Wait,
            ActionKind::LogMessage,
            ActionKind::ExitGame,
        ]
    );
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Workflow::load("/nonexistent/workflow.yaml").unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn bad_step_reports_its_index() {
    let err = Workflow::from_yaml_str(
        "name: X\nworkflow:\n  - action: wait\n  - action: click_template\n    timeout: 3\n",
    )
    .unwrap_err();
    assert_eq!(err.step_index(), Some(1));
    assert!(matches!(
        err,
        LoadError::MissingParameter {
            param: "template",
            ..
        }
    ));
}

#[test]
fn launch_without_target_is_rejected_before_running() {
    let err = Workflow::from_yaml_str("name: X\nworkflow:\n  - action: launch_game\n").unwrap_err();
    assert!(matches!(err, LoadError::MissingLaunchTarget(_)));
}

#[test]
fn unknown_parameters_are_rejected() {
    let err = Workflow::from_yaml_str(
        "name: X\nworkflow:\n  - action: press_key\n    key: a\n    keys: b\n",
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::InvalidParameter { index: 0, .. }));
}

#[test]
fn lint_flags_templates_missing_from_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("demo_game"))?;
    RgbaImage::new(2, 2).save(dir.path().join("demo_game/play.png"))?;

    let wf = Workflow::from_yaml_str(
        "name: Demo Game\nworkflow:\n  - action: click_template\n    template: play.png\n  - action: check_template\n    template: quit.png\n",
    )?;
    let warnings = wf.lint(&TemplateNamespace::new(dir.path(), wf.game.slug()));
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("quit.png"));
    Ok(())
}

fn textured(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = ((x * 37 + y * 91 + x * y * 13) % 251) as u8;
        Rgba([v, v.wrapping_mul(3), 255 - v, 255])
    })
}

struct StillScreen(RgbaImage);

impl FrameSource for StillScreen {
    fn capture(&mut self, region: Option<&Region>) -> Result<Frame> {
        let frame = Frame::new(self.0.clone(), Point::new(0, 0));
        Ok(match region {
            Some(r) => frame.crop(r),
            None => frame,
        })
    }
}

#[test]
fn clicks_a_template_found_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let screen = textured(64, 48);
    fs::create_dir_all(dir.path().join("demo_game"))?;
    image::imageops::crop_imm(&screen, 20, 10, 8, 6)
        .to_image()
        .save(dir.path().join("demo_game/button.png"))?;

    let mut rig = Rig::new();
    rig.settings = Settings {
        templates_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    let devices = Devices {
        frames: Box::new(StillScreen(screen)),
        matcher: Box::new(CorrelationMatcher),
        ..rig.devices()
    };
    let engine = gamebench::WorkflowEngine::new(&rig.settings, devices)
        .with_clock(std::rc::Rc::clone(&rig.clock));
    let wf = Workflow::from_yaml_str(
        "name: Demo Game\nworkflow:\n  - action: click_template\n    template: button.png\n    threshold: 0.95\n",
    )?;

    let report = engine.run(&wf)?;
    assert!(report.is_success(), "{:?}", report.status);
    let state = rig.state();
    assert_eq!(state.moves[0].0, Point::new(24, 13));
    assert_eq!(state.clicks, vec![MouseButton::Left]);
    Ok(())
}

#[test]
fn bundled_samples_load() -> Result<()> {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
    let settings = Settings::load(root.join("config/settings.yaml"))?;
    assert_eq!(settings.click_timeout, 10.0);

    for name in ["cyberpunk_2077.yaml", "direct_launch.yaml"] {
        let wf = Workflow::load(root.join("workflows").join(name))?;
        assert!(!wf.steps.is_empty(), "{name}");
    }
    Ok(())
}

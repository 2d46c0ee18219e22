mod common;

use anyhow::Result;
use common::{Rig, workflow};
use gamebench::workflow::{ActionKind, EntryKind};
use gamebench::{RunStatus, StepOutcome};
use std::time::Duration;

#[test]
fn empty_workflow_completes_without_entries() -> Result<()> {
    let rig = Rig::new();
    let report = rig.engine().run(&workflow("name: Empty\nworkflow: []\n"))?;
    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.log.is_empty());
    assert_eq!(rig.state().captures, 0);
    Ok(())
}

#[test]
fn optional_failure_does_not_stop_the_run() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("popup.png", &[0.1]);
    let wf = workflow(
        r#"
name: Optional
workflow:
  - action: wait_for_template
    template: popup.png
    timeout: 0
    optional: true
  - action: press_key
    key: enter
"#,
    );
    let report = rig.engine().run(&wf)?;

    assert!(report.is_success());
    assert_eq!(rig.state().keys, vec!["enter"]);
    let kinds: Vec<EntryKind> = report.log.entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EntryKind::TimedOut, EntryKind::Succeeded]);
    assert_eq!(report.log.entries()[0].step, Some(0));
    Ok(())
}

#[test]
fn required_failure_halts_before_later_steps() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("play.png", &[0.2]);
    let wf = workflow(
        r#"
name: Halt
workflow:
  - action: click_template
    template: play.png
    timeout: 0
  - action: press_key
    key: escape
  - action: take_screenshot
"#,
    );
    let report = rig.engine().run(&wf)?;

    match &report.status {
        RunStatus::Halted {
            index,
            kind,
            outcome,
        } => {
            assert_eq!(*index, 0);
            assert_eq!(*kind, ActionKind::ClickTemplate);
            assert!(matches!(outcome, StepOutcome::TimedOut { .. }));
        }
        other => panic!("expected halt, got {other:?}"),
    }
    let state = rig.state();
    assert!(state.clicks.is_empty());
    assert!(state.keys.is_empty());
    assert!(state.screenshots.is_empty());
    assert_eq!(
        report.log.entries().last().map(|e| e.kind),
        Some(EntryKind::Halted)
    );
    Ok(())
}

#[test]
fn device_errors_surface_as_step_failures() -> Result<()> {
    let rig = Rig::new();
    rig.state_mut().fail_keys = true;
    let wf = workflow(
        r#"
name: Broken keyboard
workflow:
  - action: press_key
    key: f5
"#,
    );
    let report = rig.engine().run(&wf)?;
    match report.status {
        RunStatus::Halted {
            outcome: StepOutcome::Failure { reason },
            ..
        } => assert!(reason.contains("f5"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn wait_timeout_then_screenshot_halts_after_one_second() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("loading_done.png", &[0.0]);
    let wf = workflow(
        r#"
name: Timeout
workflow:
  - action: wait_for_template
    template: loading_done.png
    timeout: 1
  - action: take_screenshot
    name: results
"#,
    );
    let report = rig.engine().run(&wf)?;

    assert!(matches!(report.status, RunStatus::Halted { index: 0, .. }));
    assert_eq!(rig.elapsed(), Duration::from_secs(1));
    let state = rig.state();
    assert!(state.screenshots.is_empty());
    // 0s, 0.5s, 1.0s
    assert_eq!(state.captures, 3);
    Ok(())
}

#[test]
fn step_delay_is_applied_after_success() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        r#"
name: Delays
workflow:
  - action: wait
    seconds: 1
    step_delay: 2
  - action: log_message
    message: DONE
"#,
    );
    let report = rig.engine().run(&wf)?;
    assert!(report.is_success());
    let done = report.log.marker("DONE").map(|e| e.at);
    assert_eq!(done, Some(Duration::from_secs(3)));
    Ok(())
}

#[test]
fn running_twice_gives_the_same_outcomes() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("menu.png", &[0.95]);
    let wf = workflow(
        r#"
name: Repeat
workflow:
  - action: log_message
    message: START
  - action: click_template
    template: menu.png
  - action: check_template
    template: menu.png
  - action: log_message
    message: END
"#,
    );
    let engine = rig.engine();
    let first = engine.run(&wf)?;
    let second = engine.run(&wf)?;

    assert_eq!(first.status, second.status);
    let shape = |r: &gamebench::RunReport| {
        r.log
            .entries()
            .iter()
            .map(|e| (e.kind, e.step, e.detail.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
    assert_eq!(rig.state().clicks.len(), 2);
    Ok(())
}

#[test]
fn report_serializes_with_status_and_entries() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        r#"
name: Json
workflow:
  - action: log_message
    message: BENCHMARK_START_TIME
"#,
    );
    let report = rig.engine().run(&wf)?;
    let json: serde_json::Value = serde_json::to_value(&report)?;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["game"], "Json");
    assert_eq!(json["log"]["entries"][0]["kind"], "marker");
    assert_eq!(json["log"]["entries"][0]["detail"], "BENCHMARK_START_TIME");
    Ok(())
}

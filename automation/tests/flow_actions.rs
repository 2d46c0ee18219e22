mod common;

use anyhow::Result;
use common::{Rig, workflow};
use gamebench::RunStatus;
use gamebench::workflow::{EntryKind, WorkflowEngine};
use std::time::Duration;

#[test]
fn retry_runs_exactly_max_retries_attempts() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("continue.png", &[0.1]);
    let wf = workflow(
        r#"
name: Retry
workflow:
  - action: retry_action
    max_retries: 3
    retry_delay: 2
    action_to_retry:
      action: click_template
      template: continue.png
      timeout: 0
"#,
    );
    let report = rig.engine().run(&wf)?;

    assert!(matches!(report.status, RunStatus::Halted { index: 0, .. }));
    assert_eq!(rig.state().match_calls["continue.png"], 3);
    // 只在两次尝试之间等待
    assert_eq!(rig.elapsed(), Duration::from_secs(4));
    let retries = report
        .log
        .entries()
        .iter()
        .filter(|e| e.kind == EntryKind::Retry)
        .count();
    assert_eq!(retries, 3);
    Ok(())
}

#[test]
fn retry_stops_at_first_success() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("continue.png", &[0.1, 0.9]);
    let wf = workflow(
        r#"
name: Retry
workflow:
  - action: retry_action
    retry_delay: 0.5
    action_to_retry:
      action: click_template
      template: continue.png
      timeout: 0
      move_duration: 0
      pre_click_delay: 0
      post_click_delay: 0
      step_delay: 1
"#,
    );
    let report = rig.engine().run(&wf)?;
    assert!(report.is_success());
    assert_eq!(rig.state().match_calls["continue.png"], 2);
    assert_eq!(rig.state().clicks.len(), 1);
    // 0.5s 重试间隔 + 子步骤自己的 1s step_delay
    assert_eq!(rig.elapsed(), Duration::from_millis(1500));
    Ok(())
}

#[test]
fn exhausted_retries_halt_even_when_sub_step_is_optional() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("promo.png", &[0.0]);
    let wf = workflow(
        r#"
name: Retry
workflow:
  - action: retry_action
    max_retries: 3
    retry_delay: 0
    action_to_retry:
      action: wait_for_template
      template: promo.png
      timeout: 0
      optional: true
  - action: press_key
    key: space
"#,
    );
    let report = rig.engine().run(&wf)?;
    assert!(matches!(report.status, RunStatus::Halted { index: 0, .. }));
    assert_eq!(rig.state().match_calls["promo.png"], 3);
    assert!(rig.state().keys.is_empty());
    Ok(())
}

#[test]
fn optional_retry_step_continues_after_exhaustion() -> Result<()> {
    let mut rig = Rig::new();
    rig.score("promo.png", &[0.0]);
    let wf = workflow(
        r#"
name: Retry
workflow:
  - action: retry_action
    optional: true
    max_retries: 2
    retry_delay: 0
    action_to_retry:
      action: wait_for_template
      template: promo.png
      timeout: 0
  - action: press_key
    key: space
"#,
    );
    let report = rig.engine().run(&wf)?;
    assert!(report.is_success());
    assert_eq!(rig.state().keys, vec!["space"]);
    Ok(())
}

#[test]
fn markers_bracket_a_wait() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        r#"
name: Markers
workflow:
  - action: log_message
    message: START
  - action: wait
    seconds: 2
  - action: log_message
    message: END
"#,
    );
    let report = rig.engine().run(&wf)?;
    let markers: Vec<&str> = report.log.markers().map(|e| e.detail.as_str()).collect();
    assert_eq!(markers, vec!["START", "END"]);
    assert_eq!(
        report.log.elapsed_between("START", "END"),
        Some(Duration::from_secs(2))
    );
    Ok(())
}

#[test]
fn markers_bracket_a_real_wait() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        "name: Wall clock\nworkflow:\n  - action: log_message\n    message: START\n  - action: wait\n    seconds: 2\n  - action: log_message\n    message: END\n",
    );
    // 系统时钟，真实等待
    let engine = WorkflowEngine::new(&rig.settings, rig.devices());
    let report = engine.run(&wf)?;

    let elapsed = report
        .log
        .elapsed_between("START", "END")
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    assert!((2.0..2.2).contains(&elapsed), "{elapsed}");
    Ok(())
}

#[test]
fn log_message_and_wait_have_defaults() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow("name: Defaults\nworkflow:\n  - action: wait\n  - action: log_message\n");
    let report = rig.engine().run(&wf)?;
    assert_eq!(
        report.log.marker("LOG_MESSAGE").map(|e| e.at),
        Some(Duration::from_secs(1))
    );
    Ok(())
}

#[test]
fn screenshots_are_numbered_per_run() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        r#"
name: Shots
workflow:
  - action: take_screenshot
    name: results
  - action: take_screenshot
    region: [0, 0, 0.5, 0.5]
"#,
    );
    let engine = rig.engine();
    engine.run(&wf)?;
    engine.run(&wf)?;
    assert_eq!(
        rig.state().screenshots,
        vec!["results_001", "screenshot_002", "results_001", "screenshot_002"]
    );
    Ok(())
}

#[test]
fn screen_change_compares_against_first_frame() -> Result<()> {
    let rig = Rig::new();
    rig.state_mut().similarities = [0.99, 0.97, 0.6].into_iter().collect();
    let wf = workflow(
        "name: Change\nworkflow:\n  - action: wait_for_screen_change\n    timeout: 10\n",
    );
    let report = rig.engine().run(&wf)?;
    assert!(report.is_success());
    // 起始帧 + 三次探测
    assert_eq!(rig.state().captures, 4);
    assert_eq!(rig.elapsed(), Duration::from_secs(1));
    Ok(())
}

#[test]
fn screen_change_times_out_on_static_screen() -> Result<()> {
    let rig = Rig::new();
    let wf = workflow(
        "name: Static\nworkflow:\n  - action: wait_for_screen_change\n    timeout: 1\n    threshold: 0.9\n",
    );
    let report = rig.engine().run(&wf)?;
    assert_eq!(report.log.entries()[0].kind, EntryKind::TimedOut);
    Ok(())
}

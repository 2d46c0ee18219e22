use super::Handler;
use crate::vision::Waited;
use crate::workflow::step::{Params, check_not_blank, check_secs, check_threshold};
use crate::workflow::{Payload, Region, Session, StepOutcome};
use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// 等待模板出现（`confidence >= threshold`）。
///
/// 参数
/// - `template`：模板名，在模板命名空间内解析。
/// - `timeout`：秒，缺省取配置 `timeout`。
/// - `region`：只在该比例区域内匹配。
/// - `threshold`：缺省取配置 `template_matching_threshold`。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForTemplate {
    pub template: String,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Params for WaitForTemplate {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("template", &self.template)?;
        check_secs("timeout", self.timeout)?;
        check_threshold(self.threshold)
    }
}

impl Handler for WaitForTemplate {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let timeout = cx.wait_timeout(self.timeout);
        info!(template = %self.template, threshold, timeout = timeout.as_secs_f64(), "等待模板出现");

        let waited =
            cx.wait_until_present(&self.template, self.region.as_ref(), threshold, timeout)?;
        Ok(match waited {
            Waited::Matched(m) => StepOutcome::success(Payload::Matched {
                template: self.template.clone(),
                location: m.location,
                confidence: m.confidence,
            }),
            Waited::TimedOut(elapsed) => StepOutcome::timed_out(
                elapsed,
                format!("{} 出现 (>= {threshold:.3})", self.template),
            ),
        })
    }
}

/// 等待一组模板中任意一个出现，成功时报告命中的是哪一个。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForAnyTemplate {
    pub templates: Vec<String>,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Params for WaitForAnyTemplate {
    fn validate(&self) -> Result<(), String> {
        if self.templates.is_empty() {
            return Err("`templates` 至少需要一个模板".into());
        }
        for t in &self.templates {
            check_not_blank("templates[]", t)?;
        }
        check_secs("timeout", self.timeout)?;
        check_threshold(self.threshold)
    }
}

impl Handler for WaitForAnyTemplate {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let timeout = cx.wait_timeout(self.timeout);
        info!(templates = ?self.templates, threshold, "等待任一模板出现");

        let waited = cx.wait_until_any(&self.templates, self.region.as_ref(), threshold, timeout)?;
        Ok(match waited {
            Waited::Matched((template, m)) => StepOutcome::success(Payload::Matched {
                template,
                location: m.location,
                confidence: m.confidence,
            }),
            Waited::TimedOut(elapsed) => StepOutcome::timed_out(
                elapsed,
                format!("任一模板出现: {}", self.templates.join(", ")),
            ),
        })
    }
}

/// 等待模板消失（`confidence < threshold`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForTemplateDisappear {
    pub template: String,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Params for WaitForTemplateDisappear {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("template", &self.template)?;
        check_secs("timeout", self.timeout)?;
        check_threshold(self.threshold)
    }
}

impl Handler for WaitForTemplateDisappear {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let timeout = cx.wait_timeout(self.timeout);
        info!(template = %self.template, threshold, "等待模板消失");

        let waited =
            cx.wait_until_absent(&self.template, self.region.as_ref(), threshold, timeout)?;
        Ok(match waited {
            Waited::Matched(_) => StepOutcome::success(Payload::Vanished {
                template: self.template.clone(),
            }),
            Waited::TimedOut(elapsed) => StepOutcome::timed_out(
                elapsed,
                format!("{} 消失 (< {threshold:.3})", self.template),
            ),
        })
    }
}

/// 只检查一次模板是否存在，不做任何输入。无论结果如何都返回成功。
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckTemplate {
    pub template: String,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Params for CheckTemplate {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("template", &self.template)?;
        check_threshold(self.threshold)
    }
}

impl Handler for CheckTemplate {
    fn run(&self, cx: &mut Session<'_>) -> Result<StepOutcome> {
        let threshold = cx.threshold(self.threshold);
        let template = cx.template(&self.template)?;
        let m = cx.probe(&template, self.region.as_ref())?;
        let present = m.confidence >= threshold;
        info!(template = %self.template, present, confidence = m.confidence, "检查模板");
        Ok(StepOutcome::success(Payload::Checked {
            template: self.template.clone(),
            present,
            confidence: m.confidence,
        }))
    }
}

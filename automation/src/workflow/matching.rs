use super::{Region, Session};
use crate::vision::{Match, Poller, Template, Waited};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

impl Session<'_> {
    /// 单次探测：截图（按区域裁剪）并计算最佳命中，坐标已换算为屏幕坐标。
    /// 模板比截图区域大时返回置信度 0。
    pub fn probe(&mut self, template: &Template, region: Option<&Region>) -> Result<Match> {
        let frame = self.capture(region)?;
        let hit = self.matcher().best_match(&frame.image, template)?;
        Ok(match hit {
            Some(h) => Match {
                location: frame.to_screen(h.center.0, h.center.1),
                confidence: h.confidence,
            },
            None => Match {
                location: frame.origin,
                confidence: 0.0,
            },
        })
    }

    /// 探测失败只记录告警，本次视为未命中。
    fn attempt(&mut self, template: &Template, region: Option<&Region>) -> Option<Match> {
        match self.probe(template, region) {
            Ok(m) => {
                debug!(template = %template.name, confidence = m.confidence, "probe");
                Some(m)
            }
            Err(e) => {
                warn!(template = %template.name, "探测失败: {e:#}");
                None
            }
        }
    }

    /// 等待模板出现：`confidence >= threshold`。
    pub fn wait_until_present(
        &mut self,
        name: &str,
        region: Option<&Region>,
        threshold: f64,
        timeout: Duration,
    ) -> Result<Waited<Match>> {
        let template = self.template(name)?;
        let clock = self.clock;
        let mut poller = Poller::new(clock, timeout, self.poll_interval());
        let state = poller.run(|| {
            self.attempt(&template, region)
                .filter(|m| m.confidence >= threshold)
        });
        debug!(template = name, attempts = poller.attempts(), "wait appear done");
        Ok(state)
    }

    /// 等待模板消失：`confidence < threshold`。探测失败不算消失。
    /// 命中时返回最后一次的置信度。
    pub fn wait_until_absent(
        &mut self,
        name: &str,
        region: Option<&Region>,
        threshold: f64,
        timeout: Duration,
    ) -> Result<Waited<f64>> {
        let template = self.template(name)?;
        let clock = self.clock;
        let mut poller = Poller::new(clock, timeout, self.poll_interval());
        let state = poller.run(|| {
            self.attempt(&template, region)
                .map(|m| m.confidence)
                .filter(|c| *c < threshold)
        });
        debug!(template = name, attempts = poller.attempts(), "wait disappear done");
        Ok(state)
    }

    /// 等待一组模板中任意一个出现。每轮只截一次图，按列表顺序取第一个过阈值的模板。
    pub fn wait_until_any(
        &mut self,
        names: &[String],
        region: Option<&Region>,
        threshold: f64,
        timeout: Duration,
    ) -> Result<Waited<(String, Match)>> {
        let templates = names
            .iter()
            .map(|n| self.template(n))
            .collect::<Result<Vec<_>>>()?;
        let clock = self.clock;
        let mut poller = Poller::new(clock, timeout, self.poll_interval());
        let state = poller.run(|| {
            let frame = match self.capture(region) {
                Ok(f) => f,
                Err(e) => {
                    warn!("截图失败: {e:#}");
                    return None;
                }
            };
            templates.iter().find_map(|t| {
                let hit = match self.matcher().best_match(&frame.image, t) {
                    Ok(h) => h?,
                    Err(e) => {
                        warn!(template = %t.name, "匹配失败: {e:#}");
                        return None;
                    }
                };
                debug!(template = %t.name, confidence = hit.confidence, "probe");
                (hit.confidence >= threshold).then(|| {
                    (
                        t.name.clone(),
                        Match {
                            location: frame.to_screen(hit.center.0, hit.center.1),
                            confidence: hit.confidence,
                        },
                    )
                })
            })
        });
        Ok(state)
    }

    /// 等待画面相对起始帧发生变化：相似度 `< threshold`。
    pub fn wait_until_changed(
        &mut self,
        region: Option<&Region>,
        threshold: f64,
        timeout: Duration,
    ) -> Result<Waited<f64>> {
        let initial = self.capture(region)?;
        let clock = self.clock;
        let mut poller = Poller::new(clock, timeout, self.poll_interval());
        let state = poller.run(|| {
            let current = match self.capture(region) {
                Ok(f) => f,
                Err(e) => {
                    warn!("截图失败: {e:#}");
                    return None;
                }
            };
            match self.matcher().similarity(&initial.image, &current.image) {
                Ok(s) => {
                    debug!(similarity = s, "screen change probe");
                    (s < threshold).then_some(s)
                }
                Err(e) => {
                    warn!("相似度计算失败: {e:#}");
                    None
                }
            }
        });
        Ok(state)
    }
}

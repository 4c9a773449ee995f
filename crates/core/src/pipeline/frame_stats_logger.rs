use std::collections::HashMap;
use std::time::Instant;

/// Stage names reported by the vision pipeline.
pub const STAGE_LOCATE: &str = "locate";
pub const STAGE_ORIENT: &str = "orient";
pub const STAGE_FEATURES: &str = "features";
pub const STAGE_FLOW: &str = "flow";

/// Metric names reported by the vision pipeline.
pub const METRIC_TRACKED_POINTS: &str = "tracked_points";

/// Observer for per-frame pipeline statistics.
///
/// Keeps timing and counters out of the orchestration code so hosts can
/// pick how (or whether) to surface them.
pub trait FrameStatsLogger: Send {
    /// Called once per frame; `skipped` frames only primed buffers.
    fn frame(&mut self, skipped: bool);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. surviving feature count).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit a summary of everything recorded so far. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Default for sessions and tests.
pub struct NullFrameStatsLogger;

impl FrameStatsLogger for NullFrameStatsLogger {
    fn frame(&mut self, _skipped: bool) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningStat {
    count: usize,
    total: f64,
    max: f64,
}

impl RunningStat {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates stage timings and metrics and writes a summary through the
/// `log` facade every `report_every` frames.
///
/// Only running totals are kept, so memory stays flat on endless streams.
pub struct LogFrameStatsLogger {
    report_every: usize,
    timings: HashMap<String, RunningStat>,
    metrics: HashMap<String, RunningStat>,
    start_time: Instant,
    frames: usize,
    skipped: usize,
}

impl LogFrameStatsLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            skipped: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Average duration of a stage in milliseconds.
    pub fn average_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(RunningStat::average)
    }

    /// Average value of a metric.
    pub fn average_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(RunningStat::average)
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Tracking summary ({} frames, {} skipped, {:.1}s):",
            self.frames,
            self.skipped,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stat) in stages {
            let avg_ms = stat.average();
            let max_ms = stat.max;
            lines.push(format!("  {stage:10}: avg {avg_ms:6.2}ms  max {max_ms:7.2}ms"));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stat) in names {
            lines.push(format!("  {name}: avg {:.1}", stat.average()));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogFrameStatsLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl FrameStatsLogger for LogFrameStatsLogger {
    fn frame(&mut self, skipped: bool) {
        self.frames += 1;
        if skipped {
            self.skipped += 1;
        }
        if self.frames % self.report_every == 0 {
            if let Some(text) = self.summary_string() {
                log::debug!("\n{text}");
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

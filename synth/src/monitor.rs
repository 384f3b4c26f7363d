//! Synthesis performance monitoring.
//!
//! Every synthesis is recorded as a [`PerformanceSample`] in a bounded ring.
//! The monitor aggregates the recent window into [`PerformanceMetrics`] on a
//! fixed tick, raises [`PerformanceAlert`]s when thresholds are crossed and
//! exposes the alert level so engine selection can back off the on-device
//! model under pressure.

use crate::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Device thermal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalState {
    #[default]
    Nominal,
    Fair,
    Serious,
    Critical,
}

impl ThermalState {
    fn base_impact(&self) -> f64 {
        match self {
            ThermalState::Nominal => 0.1,
            ThermalState::Fair => 0.3,
            ThermalState::Serious => 0.6,
            ThermalState::Critical => 0.9,
        }
    }
}

/// One reading of device resource state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceReading {
    pub memory_mb: f64,
    /// Fraction of available memory in use, 0.0 to 1.0.
    pub memory_pressure: f64,
    /// Battery drain in percent per hour.
    pub battery_drain_per_hour: f64,
    pub thermal: ThermalState,
}

/// Source of device resource readings.
pub trait DeviceTelemetry: Send + Sync {
    fn read(&self) -> DeviceReading;
}

/// A fixed reading.
impl DeviceTelemetry for DeviceReading {
    fn read(&self) -> DeviceReading {
        *self
    }
}

/// One synthesis measurement.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSample {
    pub engine: Engine,
    pub latency_ms: f64,
    pub text_len: usize,
    pub success: bool,
    pub memory_mb: f64,
    pub memory_pressure: f64,
    pub battery_drain_per_hour: f64,
    pub thermal: ThermalState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    at: Instant,
}

/// Severity of the current performance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighLatency,
    MemoryPressure,
    BatteryDrain,
    LowSuccessRate,
    ThermalImpact,
}

/// A threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceAlert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub value: f64,
    pub threshold: f64,
}

/// Aggregated metrics over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub average_latency_ms: f64,
    pub platform_latency_ms: Option<f64>,
    pub on_device_latency_ms: Option<f64>,
    pub memory_mb: f64,
    pub memory_pressure: f64,
    pub battery_drain_per_hour: f64,
    pub success_rate: f64,
    pub platform_usage: usize,
    pub on_device_usage: usize,
    pub thermal_impact: f64,
    pub sample_count: usize,
    pub alert_level: AlertLevel,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            average_latency_ms: 0.0,
            platform_latency_ms: None,
            on_device_latency_ms: None,
            memory_mb: 0.0,
            memory_pressure: 0.0,
            battery_drain_per_hour: 0.0,
            success_rate: 1.0,
            platform_usage: 0,
            on_device_usage: 0,
            thermal_impact: 0.0,
            sample_count: 0,
            alert_level: AlertLevel::Normal,
        }
    }
}

/// Per-engine statistics over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineAnalytics {
    pub engine: Engine,
    pub requests: usize,
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub max_latency_ms: f64,
    pub average_text_len: f64,
}

/// Snapshot for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    pub engines: Vec<EngineAnalytics>,
    pub recommendations: Vec<String>,
}

/// Reactions to a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Adaptation {
    /// Ask the on-device model to drop caches.
    pub optimize_memory: bool,
    /// Switch the voice profile to battery saver.
    pub battery_saver: bool,
}

/// Monitor thresholds and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub capacity: usize,
    pub evaluation_interval_ms: u64,
    pub window_secs: u64,
    pub latency_warning_ms: f64,
    pub latency_critical_ms: f64,
    pub memory_critical: f64,
    pub battery_warning_per_hour: f64,
    pub min_success_rate: f64,
    pub thermal_warning: f64,
    /// Memory pressure at which the model is asked to shed memory.
    pub memory_optimize: f64,
    /// Battery drain at which battery saver is switched on.
    pub battery_saver_per_hour: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            evaluation_interval_ms: 5000,
            window_secs: 300,
            latency_warning_ms: 500.0,
            latency_critical_ms: 1000.0,
            memory_critical: 0.85,
            battery_warning_per_hour: 5.0,
            min_success_rate: 0.9,
            thermal_warning: 0.7,
            memory_optimize: 0.8,
            battery_saver_per_hour: 4.0,
        }
    }
}

/// Records synthesis samples and publishes metrics and alerts.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    telemetry: Arc<dyn DeviceTelemetry>,
    samples: Mutex<VecDeque<PerformanceSample>>,
    active: Mutex<HashSet<AlertKind>>,
    metrics: watch::Sender<PerformanceMetrics>,
    alerts: broadcast::Sender<PerformanceAlert>,
}

impl PerformanceMonitor {
    pub fn new(telemetry: Arc<dyn DeviceTelemetry>, config: MonitorConfig) -> Self {
        let (metrics, _) = watch::channel(PerformanceMetrics::default());
        let (alerts, _) = broadcast::channel(64);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(config.capacity)),
            config,
            telemetry,
            active: Mutex::new(HashSet::new()),
            metrics,
            alerts,
        }
    }

    /// Records one synthesis.
    ///
    /// A sample at or above the critical latency triggers an immediate
    /// evaluation.
    pub fn record_synthesis(
        &self,
        engine: Engine,
        latency: Duration,
        text_len: usize,
        success: bool,
    ) -> PerformanceSample {
        let reading = self.telemetry.read();
        let sample = PerformanceSample {
            engine,
            latency_ms: latency.as_secs_f64() * 1000.0,
            text_len,
            success,
            memory_mb: reading.memory_mb,
            memory_pressure: reading.memory_pressure,
            battery_drain_per_hour: reading.battery_drain_per_hour,
            thermal: reading.thermal,
            timestamp: Utc::now(),
            at: Instant::now(),
        };

        {
            let mut samples = self.samples.lock();
            if samples.len() >= self.config.capacity.max(1) {
                samples.pop_front();
            }
            samples.push_back(sample.clone());
        }

        if sample.latency_ms > self.config.latency_warning_ms {
            debug!(engine = %engine, latency_ms = sample.latency_ms, "monitor: slow synthesis");
        }
        if sample.latency_ms >= self.config.latency_critical_ms {
            self.evaluate();
        }
        sample
    }

    /// Number of samples in the ring.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    fn recent(&self, window: Duration) -> Vec<PerformanceSample> {
        let now = Instant::now();
        self.samples
            .lock()
            .iter()
            .filter(|s| now.saturating_duration_since(s.at) <= window)
            .cloned()
            .collect()
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    /// Rolling average latency of an engine over the recent window.
    pub fn average_latency(&self, engine: Engine) -> Option<Duration> {
        let recent = self.recent(self.window());
        average(recent.iter().filter(|s| s.engine == engine).map(|s| s.latency_ms))
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
    }

    /// Recomputes metrics, publishes them and broadcasts newly raised alerts.
    pub fn evaluate(&self) -> PerformanceMetrics {
        let recent = self.recent(self.window());
        let reading = self.telemetry.read();
        let last_two_minutes = self.recent(Duration::from_secs(120)).len();

        let mut metrics = PerformanceMetrics {
            average_latency_ms: average(recent.iter().map(|s| s.latency_ms)).unwrap_or(0.0),
            platform_latency_ms: average(
                recent
                    .iter()
                    .filter(|s| s.engine == Engine::Platform)
                    .map(|s| s.latency_ms),
            ),
            on_device_latency_ms: average(
                recent
                    .iter()
                    .filter(|s| s.engine == Engine::OnDevice)
                    .map(|s| s.latency_ms),
            ),
            memory_mb: reading.memory_mb,
            memory_pressure: reading.memory_pressure,
            battery_drain_per_hour: reading.battery_drain_per_hour,
            success_rate: if recent.is_empty() {
                1.0
            } else {
                recent.iter().filter(|s| s.success).count() as f64 / recent.len() as f64
            },
            platform_usage: recent.iter().filter(|s| s.engine == Engine::Platform).count(),
            on_device_usage: recent.iter().filter(|s| s.engine == Engine::OnDevice).count(),
            thermal_impact: reading.thermal.base_impact()
                * (1.0 + last_two_minutes as f64 / 10.0).min(2.0),
            sample_count: recent.len(),
            alert_level: AlertLevel::Normal,
        };

        let alerts = self.check(&metrics);
        metrics.alert_level = alerts
            .iter()
            .map(|a| a.level)
            .max()
            .unwrap_or(AlertLevel::Normal);

        let raised: Vec<PerformanceAlert> = {
            let mut active = self.active.lock();
            let raised = alerts
                .iter()
                .filter(|a| !active.contains(&a.kind))
                .cloned()
                .collect();
            *active = alerts.iter().map(|a| a.kind).collect();
            raised
        };
        for alert in raised {
            warn!(kind = ?alert.kind, level = ?alert.level, value = alert.value, "monitor: alert");
            let _ = self.alerts.send(alert);
        }

        self.metrics.send_replace(metrics.clone());
        metrics
    }

    fn check(&self, m: &PerformanceMetrics) -> Vec<PerformanceAlert> {
        let c = &self.config;
        let mut alerts = Vec::new();

        if m.average_latency_ms >= c.latency_critical_ms {
            alerts.push(PerformanceAlert {
                kind: AlertKind::HighLatency,
                level: AlertLevel::Critical,
                value: m.average_latency_ms,
                threshold: c.latency_critical_ms,
            });
        } else if m.average_latency_ms >= c.latency_warning_ms {
            alerts.push(PerformanceAlert {
                kind: AlertKind::HighLatency,
                level: AlertLevel::Warning,
                value: m.average_latency_ms,
                threshold: c.latency_warning_ms,
            });
        }
        if m.memory_pressure >= c.memory_critical {
            alerts.push(PerformanceAlert {
                kind: AlertKind::MemoryPressure,
                level: AlertLevel::Critical,
                value: m.memory_pressure,
                threshold: c.memory_critical,
            });
        }
        if m.battery_drain_per_hour >= c.battery_warning_per_hour {
            alerts.push(PerformanceAlert {
                kind: AlertKind::BatteryDrain,
                level: AlertLevel::Warning,
                value: m.battery_drain_per_hour,
                threshold: c.battery_warning_per_hour,
            });
        }
        if m.sample_count > 0 && m.success_rate < c.min_success_rate {
            alerts.push(PerformanceAlert {
                kind: AlertKind::LowSuccessRate,
                level: AlertLevel::Warning,
                value: m.success_rate,
                threshold: c.min_success_rate,
            });
        }
        if m.thermal_impact > c.thermal_warning {
            alerts.push(PerformanceAlert {
                kind: AlertKind::ThermalImpact,
                level: AlertLevel::Warning,
                value: m.thermal_impact,
                threshold: c.thermal_warning,
            });
        }
        alerts
    }

    /// Returns the last published metrics.
    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics.borrow().clone()
    }

    /// Returns the alert level of the last evaluation.
    pub fn alert_level(&self) -> AlertLevel {
        self.metrics.borrow().alert_level
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<PerformanceMetrics> {
        self.metrics.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.alerts.subscribe()
    }

    /// Decides how the pipeline should react to a sample.
    pub fn adaptation(&self, sample: &PerformanceSample) -> Adaptation {
        Adaptation {
            optimize_memory: sample.memory_pressure > self.config.memory_optimize,
            battery_saver: sample.battery_drain_per_hour > self.config.battery_saver_per_hour,
        }
    }

    /// Per-engine statistics over the recent window.
    pub fn engine_analytics(&self, engine: Engine) -> EngineAnalytics {
        let recent = self.recent(self.window());
        let samples: Vec<&PerformanceSample> = recent.iter().filter(|s| s.engine == engine).collect();
        let requests = samples.len();
        EngineAnalytics {
            engine,
            requests,
            success_rate: if requests == 0 {
                0.0
            } else {
                samples.iter().filter(|s| s.success).count() as f64 / requests as f64
            },
            average_latency_ms: average(samples.iter().map(|s| s.latency_ms)).unwrap_or(0.0),
            max_latency_ms: samples.iter().map(|s| s.latency_ms).fold(0.0, f64::max),
            average_text_len: average(samples.iter().map(|s| s.text_len as f64)).unwrap_or(0.0),
        }
    }

    /// Suggestions derived from the last metrics and engine analytics.
    pub fn recommendations(&self) -> Vec<String> {
        let m = self.metrics();
        let platform = self.engine_analytics(Engine::Platform);
        let on_device = self.engine_analytics(Engine::OnDevice);
        let mut out = Vec::new();

        if platform.requests > 0
            && on_device.requests > 0
            && on_device.average_latency_ms > platform.average_latency_ms * 1.5
        {
            out.push(format!(
                "Prefer the platform engine: on-device synthesis is {:.0}ms slower on average",
                on_device.average_latency_ms - platform.average_latency_ms
            ));
        }
        if m.memory_pressure > 0.7 {
            out.push("Release synthesis caches and reduce model memory".to_string());
        }
        if m.battery_drain_per_hour > self.config.battery_saver_per_hour {
            out.push("Enable battery saver voice settings".to_string());
        }

        let recent = self.recent(Duration::from_secs(600));
        let long_failures = recent.iter().filter(|s| s.text_len > 200 && !s.success).count();
        if !recent.is_empty() && long_failures > recent.len() / 4 {
            out.push("Split long texts to improve synthesis success".to_string());
        }
        out
    }

    /// Builds a diagnostics report.
    pub fn report(&self) -> PerformanceReport {
        PerformanceReport {
            generated_at: Utc::now(),
            metrics: self.metrics(),
            engines: vec![
                self.engine_analytics(Engine::Platform),
                self.engine_analytics(Engine::OnDevice),
            ],
            recommendations: self.recommendations(),
        }
    }

    /// Spawns the periodic evaluation task.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = Duration::from_millis(self.config.evaluation_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.evaluate();
                    }
                }
            }
        })
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0_f64, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

#[cfg(test)]
mod monitor_tests {
    use super::*;

    fn monitor(reading: DeviceReading) -> PerformanceMonitor {
        PerformanceMonitor::new(Arc::new(reading), MonitorConfig::default())
    }

    #[test]
    fn test_ring_is_bounded() {
        let m = PerformanceMonitor::new(
            Arc::new(DeviceReading::default()),
            MonitorConfig {
                capacity: 3,
                ..Default::default()
            },
        );
        for _ in 0..5 {
            m.record_synthesis(Engine::Platform, Duration::from_millis(10), 5, true);
        }
        assert_eq!(m.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_average_latency_per_engine() {
        let m = monitor(DeviceReading::default());
        assert!(m.average_latency(Engine::OnDevice).is_none());
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(100), 5, true);
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(300), 5, true);
        m.record_synthesis(Engine::Platform, Duration::from_millis(50), 5, true);
        assert_eq!(m.average_latency(Engine::OnDevice), Some(Duration::from_millis(200)));
        assert_eq!(m.average_latency(Engine::Platform), Some(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires_samples() {
        let m = monitor(DeviceReading::default());
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(900), 5, true);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(m.average_latency(Engine::OnDevice).is_none());
        assert_eq!(m.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_alert_levels() {
        let m = monitor(DeviceReading::default());
        let mut alerts = m.subscribe_alerts();

        m.record_synthesis(Engine::OnDevice, Duration::from_millis(600), 5, true);
        let metrics = m.evaluate();
        assert_eq!(metrics.alert_level, AlertLevel::Warning);
        let alert = alerts.try_recv().unwrap();
        assert_eq!(alert.kind, AlertKind::HighLatency);
        assert_eq!(alert.level, AlertLevel::Warning);

        // Still active: not raised again.
        m.evaluate();
        assert!(alerts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_sample_evaluates_immediately() {
        let m = monitor(DeviceReading::default());
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(1500), 5, true);
        assert_eq!(m.alert_level(), AlertLevel::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_alerts() {
        let m = monitor(DeviceReading {
            memory_mb: 900.0,
            memory_pressure: 0.9,
            battery_drain_per_hour: 6.0,
            thermal: ThermalState::Nominal,
        });
        let mut alerts = m.subscribe_alerts();
        let metrics = m.evaluate();
        assert_eq!(metrics.alert_level, AlertLevel::Critical);

        let mut kinds = vec![alerts.try_recv().unwrap().kind, alerts.try_recv().unwrap().kind];
        kinds.sort_by_key(|k| format!("{:?}", k));
        assert_eq!(kinds, vec![AlertKind::BatteryDrain, AlertKind::MemoryPressure]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_rate_and_usage() {
        let m = monitor(DeviceReading::default());
        for i in 0..10 {
            m.record_synthesis(Engine::Platform, Duration::from_millis(20), 5, i != 0);
        }
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(20), 5, false);
        let metrics = m.evaluate();
        assert_eq!(metrics.platform_usage, 10);
        assert_eq!(metrics.on_device_usage, 1);
        assert!((metrics.success_rate - 9.0 / 11.0).abs() < 1e-9);
        assert_eq!(metrics.alert_level, AlertLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thermal_impact_scales_with_activity() {
        let m = monitor(DeviceReading {
            thermal: ThermalState::Serious,
            ..Default::default()
        });
        assert!((m.evaluate().thermal_impact - 0.6).abs() < 1e-9);
        for _ in 0..5 {
            m.record_synthesis(Engine::Platform, Duration::from_millis(20), 5, true);
        }
        let metrics = m.evaluate();
        assert!((metrics.thermal_impact - 0.9).abs() < 1e-9);
        assert_eq!(metrics.alert_level, AlertLevel::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adaptation() {
        let m = monitor(DeviceReading {
            memory_pressure: 0.82,
            battery_drain_per_hour: 4.5,
            ..Default::default()
        });
        let sample = m.record_synthesis(Engine::OnDevice, Duration::from_millis(20), 5, true);
        let a = m.adaptation(&sample);
        assert!(a.optimize_memory);
        assert!(a.battery_saver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_recommendations() {
        let m = monitor(DeviceReading {
            memory_pressure: 0.75,
            ..Default::default()
        });
        m.record_synthesis(Engine::Platform, Duration::from_millis(100), 5, true);
        m.record_synthesis(Engine::OnDevice, Duration::from_millis(400), 5, true);
        m.evaluate();
        let report = m.report();
        assert_eq!(report.engines.len(), 2);
        assert_eq!(report.engines[1].requests, 1);
        assert!(report.recommendations.iter().any(|r| r.contains("platform engine")));
        assert!(report.recommendations.iter().any(|r| r.contains("memory")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_evaluation() {
        let m = Arc::new(monitor(DeviceReading::default()));
        let mut rx = m.subscribe_metrics();
        let cancel = CancellationToken::new();
        let handle = m.clone().spawn(cancel.clone());

        m.record_synthesis(Engine::Platform, Duration::from_millis(30), 5, true);
        tokio::time::sleep(Duration::from_millis(5100)).await;
        rx.wait_for(|metrics| metrics.sample_count == 1).await.unwrap();

        cancel.cancel();
        handle.await.unwrap();
    }
}

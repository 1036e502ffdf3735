//! 主机资源采样：CPU、内存、根分区磁盘占用
//!
//! 后台任务按 [monitor].sample_interval_secs 采样并写入 Monitor；health 据阈值给出告警。
//! sysinfo 的刷新是阻塞调用，放在 spawn_blocking 中执行。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorSection;
use crate::observability::Monitor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_mb: f64,
    pub disk_percent: f32,
    pub sampled_at: DateTime<Utc>,
}

/// 告警阈值（百分比，严格大于才告警）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceThresholds {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_percent: 90.0,
        }
    }
}

impl ResourceThresholds {
    pub fn from_config(cfg: &MonitorSection) -> Self {
        Self {
            cpu_percent: cfg.cpu_warn_percent,
            memory_percent: cfg.memory_warn_percent,
            disk_percent: cfg.disk_warn_percent,
        }
    }

    pub fn warnings(&self, sample: &SystemSample) -> Vec<String> {
        let mut warnings = Vec::new();
        if sample.cpu_percent > self.cpu_percent {
            warnings.push(format!("High CPU usage: {:.1}%", sample.cpu_percent));
        }
        if sample.memory_percent > self.memory_percent {
            warnings.push(format!("High memory usage: {:.1}%", sample.memory_percent));
        }
        if sample.disk_percent > self.disk_percent {
            warnings.push(format!("High disk usage: {:.1}%", sample.disk_percent));
        }
        warnings
    }
}

pub struct SystemSampler {
    sys: System,
    primed: bool,
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            primed: false,
        }
    }

    /// 阻塞调用；首次采样需两次 CPU 刷新才有有效读数
    pub fn sample(&mut self) -> SystemSample {
        if !self.primed {
            self.sys.refresh_cpu();
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
            self.primed = true;
        }
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let used = self.sys.used_memory();
        SystemSample {
            cpu_percent: self.sys.global_cpu_info().cpu_usage(),
            memory_percent: percent(used, total),
            memory_mb: used as f64 / (1024.0 * 1024.0),
            disk_percent: root_disk_percent(),
            sampled_at: Utc::now(),
        }
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (used as f64 / total as f64 * 100.0) as f32
    }
}

/// 优先取挂载点为 / 的磁盘，否则第一块
fn root_disk_percent() -> f32 {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.list().first());
    match disk {
        Some(d) => {
            let total = d.total_space();
            percent(total.saturating_sub(d.available_space()), total)
        }
        None => 0.0,
    }
}

/// 启动后台采样，cancel 取消后退出
pub fn spawn_sampler(
    monitor: Arc<Monitor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = SystemSampler::new();
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), "system monitoring started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let taken = tokio::task::spawn_blocking(move || {
                let sample = sampler.sample();
                (sampler, sample)
            })
            .await;
            match taken {
                Ok((back, sample)) => {
                    sampler = back;
                    tracing::debug!(
                        cpu = sample.cpu_percent,
                        memory = sample.memory_percent,
                        disk = sample.disk_percent,
                        "system sample"
                    );
                    monitor.record_system(sample);
                }
                Err(e) => {
                    tracing::error!(error = %e, "system sampler failed, monitoring stopped");
                    break;
                }
            }
        }
        tracing::info!("system monitoring stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f32, memory: f32, disk: f32) -> SystemSample {
        SystemSample {
            cpu_percent: cpu,
            memory_percent: memory,
            memory_mb: 512.0,
            disk_percent: disk,
            sampled_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_warnings() {
        let t = ResourceThresholds::default();
        assert!(t.warnings(&sample(80.0, 85.0, 90.0)).is_empty());

        let w = t.warnings(&sample(91.5, 86.0, 95.0));
        assert_eq!(
            w,
            vec![
                "High CPU usage: 91.5%",
                "High memory usage: 86.0%",
                "High disk usage: 95.0%"
            ]
        );
    }

    #[test]
    fn test_thresholds_from_config() {
        let cfg = MonitorSection {
            cpu_warn_percent: 50.0,
            ..MonitorSection::default()
        };
        let t = ResourceThresholds::from_config(&cfg);
        assert_eq!(t.warnings(&sample(60.0, 10.0, 10.0)).len(), 1);
    }

    #[test]
    fn test_real_sample_is_in_range() {
        let s = SystemSampler::new().sample();
        assert!((0.0..=100.0).contains(&s.memory_percent));
        assert!((0.0..=100.0).contains(&s.disk_percent));
        assert!(s.cpu_percent >= 0.0);
    }

    #[tokio::test]
    async fn test_sampler_feeds_monitor_and_stops_on_cancel() {
        let monitor = Arc::new(Monitor::new());
        let cancel = CancellationToken::new();
        let handle = spawn_sampler(Arc::clone(&monitor), Duration::from_secs(60), cancel.clone());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while monitor.snapshot().system.is_none() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(monitor.snapshot().system.is_some());
        assert!(monitor.health().system.is_some());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

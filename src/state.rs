use crate::samplers::MetricsReading;
use std::time::{SystemTime, UNIX_EPOCH};

/// Снимок состояния системы на момент последнего тика.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    pub boot_unix_ms: i64,
    pub last_update_unix_ms: i64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub io_usage: f64,
    pub network_usage: f64,
    pub process_count: u32,
    pub user_count: u32,
    pub battery_level: f64,
    pub on_ac_power: bool,
    pub tick_count: u64,
}

impl SystemState {
    pub fn new(now_unix_ms: i64) -> Self {
        Self {
            boot_unix_ms: now_unix_ms,
            last_update_unix_ms: now_unix_ms,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            io_usage: 0.0,
            network_usage: 0.0,
            process_count: 0,
            user_count: 0,
            battery_level: 100.0,
            on_ac_power: true,
            tick_count: 0,
        }
    }

    /// Применяет показания одного тика. Доли зажимаются в 0..1, заряд в
    /// 0..100, метка обновления не убывает независимо от источника показаний.
    pub fn apply_reading(&mut self, now_unix_ms: i64, reading: MetricsReading) {
        self.last_update_unix_ms = now_unix_ms.max(self.last_update_unix_ms);
        self.cpu_usage = reading.cpu_usage.clamp(0.0, 1.0);
        self.memory_usage = reading.memory_usage.clamp(0.0, 1.0);
        self.io_usage = reading.io_usage.clamp(0.0, 1.0);
        self.network_usage = reading.network_usage.clamp(0.0, 1.0);
        self.process_count = reading.process_count;
        self.user_count = reading.user_count;
        self.battery_level = reading.battery_level.clamp(0.0, 100.0);
        self.on_ac_power = reading.on_ac_power;
        self.tick_count = self.tick_count.saturating_add(1);
    }

    pub fn uptime_seconds(&self, now_unix_ms: i64) -> u64 {
        now_unix_ms.saturating_sub(self.boot_unix_ms).max(0) as u64 / 1000
    }
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

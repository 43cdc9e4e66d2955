pub mod simulated;

use crate::state::SystemState;

/// Показания всех метрик за один тик.
#[derive(Debug, Clone)]
pub struct MetricsReading {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub io_usage: f64,
    pub network_usage: f64,
    pub process_count: u32,
    pub user_count: u32,
    pub battery_level: f64,
    pub on_ac_power: bool,
}

/// Источник показаний для цикла мониторинга. Реализация по умолчанию
/// имитирует метрики; реальный опрос ОС подставляется сюда же.
pub trait Sampler: Send + 'static {
    fn sample(&mut self, previous: &SystemState) -> MetricsReading;
}

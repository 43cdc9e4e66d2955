use crate::samplers::Sampler;
use crate::state::{now_unix_ms, SystemState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Крючок проверки аномалий, вызывается после каждой записи состояния.
/// Что считать аномалией, решает реализация крючка.
pub trait AnomalyDetector: Send + 'static {
    fn inspect(&mut self, state: &SystemState);
}

pub struct NoopAnomalyDetector;

impl AnomalyDetector for NoopAnomalyDetector {
    fn inspect(&mut self, _state: &SystemState) {}
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("монитор уже запущен")]
    AlreadyRunning,
    #[error("нет доступной среды выполнения tokio: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Владеет общим состоянием и фоновым циклом мониторинга.
///
/// Единственный писатель состояния — фоновая задача; читатели получают
/// клонированный снимок и не могут увидеть частично обновлённую запись.
pub struct SystemMonitor {
    state: Arc<RwLock<SystemState>>,
    interval_tx: watch::Sender<Duration>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl SystemMonitor {
    pub fn new(interval: Duration) -> Self {
        let (interval_tx, _) = watch::channel(interval);
        Self {
            state: Arc::new(RwLock::new(SystemState::new(now_unix_ms()))),
            interval_tx,
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn start<S, D>(&mut self, sampler: S, detector: D) -> Result<(), StartupError>
    where
        S: Sampler,
        D: AnomalyDetector,
    {
        if self.task.is_some() {
            return Err(StartupError::AlreadyRunning);
        }

        let handle = Handle::try_current()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval_rx = self.interval_tx.subscribe();
        let state = self.state.clone();
        let task = handle.spawn(run_loop(state, sampler, detector, interval_rx, shutdown_rx));

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        info!(
            interval_ms = self.interval().as_millis() as u64,
            "монитор запущен"
        );
        Ok(())
    }

    /// Сигнализирует циклу остановиться и дожидается завершения задачи.
    /// Повторный вызов безопасен.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("задача мониторинга завершилась аварийно");
            }
            info!("монитор остановлен");
        }
    }

    /// Новый период начинает действовать со следующего засыпания цикла.
    pub fn set_interval(&self, interval: Duration) {
        if interval.is_zero() {
            warn!("нулевой интервал мониторинга игнорируется");
            return;
        }
        let _ = self.interval_tx.send(interval);
    }

    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    pub async fn current_state(&self) -> SystemState {
        self.state.read().await.clone()
    }

    pub fn state_handle(&self) -> Arc<RwLock<SystemState>> {
        self.state.clone()
    }
}

async fn run_loop<S, D>(
    state: Arc<RwLock<SystemState>>,
    mut sampler: S,
    mut detector: D,
    mut interval_rx: watch::Receiver<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: Sampler,
    D: AnomalyDetector,
{
    let mut ticker = tokio::time::interval(*interval_rx.borrow());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!("получен сигнал остановки, цикл мониторинга завершается");
                break;
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow();
                ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(
                    interval_ms = period.as_millis() as u64,
                    "интервал мониторинга обновлён"
                );
            }
            _ = ticker.tick() => {
                let snapshot = {
                    let mut guard = state.write().await;
                    let reading = sampler.sample(&guard);
                    guard.apply_reading(now_unix_ms(), reading);
                    guard.clone()
                };
                detector.inspect(&snapshot);
                debug!(
                    tick = snapshot.tick_count,
                    cpu = snapshot.cpu_usage,
                    memory = snapshot.memory_usage,
                    battery = snapshot.battery_level,
                    on_ac = snapshot.on_ac_power,
                    "state refreshed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplerConfig;
    use crate::samplers::simulated::SimulatedSampler;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn test_sampler() -> SimulatedSampler {
        SimulatedSampler::with_rng(SamplerConfig::default(), StdRng::seed_from_u64(1))
    }

    struct CountingDetector {
        calls: Arc<AtomicU64>,
    }

    impl AnomalyDetector for CountingDetector {
        fn inspect(&mut self, _state: &SystemState) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn defaults_until_first_tick() {
        let monitor = SystemMonitor::new(Duration::from_millis(10));
        let state = monitor.current_state().await;
        assert_eq!(state.tick_count, 0);
        assert_eq!(state.cpu_usage, 0.0);
        assert_eq!(state.memory_usage, 0.0);
        assert_eq!(state.io_usage, 0.0);
        assert_eq!(state.network_usage, 0.0);
        assert_eq!(state.battery_level, 100.0);
        assert!(state.on_ac_power);
        assert_eq!(state.last_update_unix_ms, state.boot_unix_ms);
    }

    #[test]
    fn start_without_runtime_fails() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        let err = monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect_err("без tokio запуск должен падать");
        assert!(matches!(err, StartupError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn double_start_fails() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("первый запуск");
        let err = monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect_err("повторный запуск должен падать");
        assert!(matches!(err, StartupError::AlreadyRunning));
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_configured_interval() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("запуск");
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.stop().await;

        let ticks = monitor.current_state().await.tick_count;
        assert!((8..=12).contains(&ticks), "ticks = {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn no_mutation_after_stop() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("запуск");
        tokio::time::sleep(Duration::from_millis(35)).await;
        monitor.stop().await;

        let before = monitor.current_state().await;
        assert!(before.tick_count > 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let after = monitor.current_state().await;
        assert_eq!(before, after);
    }

    #[tokio::test(start_paused = true)]
    async fn set_interval_applies_from_next_period() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("запуск");
        tokio::time::sleep(Duration::from_millis(25)).await;

        monitor.set_interval(Duration::from_millis(100));
        let before = monitor.current_state().await.tick_count;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let within_new_period = monitor.current_state().await.tick_count;
        assert_eq!(before, within_new_period);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let after_new_period = monitor.current_state().await.tick_count;
        assert_eq!(after_new_period, before + 1);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn zero_interval_is_ignored() {
        let monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor.set_interval(Duration::ZERO);
        assert_eq!(monitor.interval(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn detector_runs_once_per_tick() {
        let calls = Arc::new(AtomicU64::new(0));
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(
                test_sampler(),
                CountingDetector {
                    calls: calls.clone(),
                },
            )
            .expect("запуск");
        tokio::time::sleep(Duration::from_millis(55)).await;
        monitor.stop().await;

        let ticks = monitor.current_state().await.tick_count;
        assert!(ticks > 0);
        assert_eq!(calls.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resumes_from_existing_state() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(10));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("первый запуск");
        tokio::time::sleep(Duration::from_millis(25)).await;
        monitor.stop().await;
        let first_run = monitor.current_state().await;
        assert!(first_run.tick_count > 0);

        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("повторный запуск после остановки");
        tokio::time::sleep(Duration::from_millis(25)).await;
        monitor.stop().await;

        let second_run = monitor.current_state().await;
        assert!(second_run.tick_count > first_run.tick_count);
        assert_eq!(second_run.boot_unix_ms, first_run.boot_unix_ms);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_see_consistent_snapshots() {
        let mut monitor = SystemMonitor::new(Duration::from_millis(1));
        monitor
            .start(test_sampler(), NoopAnomalyDetector)
            .expect("запуск");

        let mut readers = Vec::new();
        for _ in 0..4 {
            let state = monitor.state_handle();
            readers.push(tokio::spawn(async move {
                let mut last_update = 0_i64;
                let mut last_tick = 0_u64;
                for _ in 0..200 {
                    let snapshot = state.read().await.clone();
                    assert!((0.0..=1.0).contains(&snapshot.cpu_usage));
                    assert!((0.0..=1.0).contains(&snapshot.memory_usage));
                    assert!((0.0..=1.0).contains(&snapshot.io_usage));
                    assert!((0.0..=1.0).contains(&snapshot.network_usage));
                    assert!((0.0..=100.0).contains(&snapshot.battery_level));
                    assert!(snapshot.last_update_unix_ms >= snapshot.boot_unix_ms);
                    assert!(snapshot.last_update_unix_ms >= last_update);
                    assert!(snapshot.tick_count >= last_tick);
                    last_update = snapshot.last_update_unix_ms;
                    last_tick = snapshot.tick_count;
                    tokio::task::yield_now().await;
                }
            }));
        }

        for reader in readers {
            reader.await.expect("читатель завершился без паник");
        }
        monitor.stop().await;
    }
}

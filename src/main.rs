mod config;
mod monitor;
mod samplers;
mod state;

use clap::Parser;
use config::Config;
use monitor::{NoopAnomalyDetector, SystemMonitor};
use samplers::simulated::SimulatedSampler;
use state::now_unix_ms;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "statemond")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };

    let mut system_monitor = SystemMonitor::new(Duration::from_millis(cfg.interval_ms));
    if let Some(interval_ms) = cli.interval_ms {
        if interval_ms < 1 {
            error!("значение --interval-ms должно быть >= 1");
            std::process::exit(1);
        }
        system_monitor.set_interval(Duration::from_millis(interval_ms));
    }

    info!(
        interval_ms = system_monitor.interval().as_millis() as u64,
        status_interval_secs = cfg.status_interval_secs,
        "запуск statemond"
    );

    let sampler = SimulatedSampler::new(cfg.sampler.clone());
    if let Err(err) = system_monitor.start(sampler, NoopAnomalyDetector) {
        error!(error = %err, "не удалось запустить монитор");
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let status_task = if cfg.status_interval_secs > 0 {
        let state = system_monitor.state_handle();
        let mut shutdown = shutdown_rx.clone();
        let period = Duration::from_secs(cfg.status_interval_secs);
        Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let snapshot = state.read().await.clone();
                        let uptime = Duration::from_secs(snapshot.uptime_seconds(now_unix_ms()));
                        info!(
                            cpu = snapshot.cpu_usage,
                            memory = snapshot.memory_usage,
                            io = snapshot.io_usage,
                            network = snapshot.network_usage,
                            processes = snapshot.process_count,
                            users = snapshot.user_count,
                            battery = snapshot.battery_level,
                            on_ac = snapshot.on_ac_power,
                            ticks = snapshot.tick_count,
                            uptime = %humantime::format_duration(uptime),
                            "состояние системы"
                        );
                    }
                }
            }
        }))
    } else {
        None
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);
    system_monitor.stop().await;

    let final_state = system_monitor.current_state().await;
    let uptime = Duration::from_secs(final_state.uptime_seconds(now_unix_ms()));
    info!(
        ticks = final_state.tick_count,
        uptime = %humantime::format_duration(uptime),
        "статистика за время работы"
    );

    if let Some(task) = status_task {
        let _ = task.await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

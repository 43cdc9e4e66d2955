use crate::config::SamplerConfig;
use crate::samplers::{MetricsReading, Sampler};
use crate::state::SystemState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Имитация метрик вместо реальных запросов к ОС: CPU движется ограниченным
/// случайным блужданием, остальные метрики дрожат вокруг фиксированных
/// середин, питание изредка переключается между сетью и батареей.
pub struct SimulatedSampler {
    cfg: SamplerConfig,
    rng: StdRng,
}

impl SimulatedSampler {
    pub fn new(cfg: SamplerConfig) -> Self {
        Self::with_rng(cfg, StdRng::from_entropy())
    }

    pub fn with_rng(cfg: SamplerConfig, rng: StdRng) -> Self {
        Self { cfg, rng }
    }

    fn sample_cpu_usage(&mut self, previous: f64) -> f64 {
        let step = self.rng.gen_range(-self.cfg.cpu_step..=self.cfg.cpu_step);
        (previous + step).clamp(self.cfg.cpu_floor, self.cfg.cpu_ceiling)
    }

    fn sample_memory_usage(&mut self) -> f64 {
        self.jitter_around(self.cfg.memory_base, self.cfg.memory_jitter)
    }

    fn sample_io_usage(&mut self) -> f64 {
        self.jitter_around(self.cfg.io_base, self.cfg.io_jitter)
    }

    fn sample_network_usage(&mut self) -> f64 {
        self.jitter_around(self.cfg.network_base, self.cfg.network_jitter)
    }

    fn sample_process_count(&mut self) -> u32 {
        self.rng
            .gen_range(self.cfg.process_count_min..=self.cfg.process_count_max)
    }

    fn sample_user_count(&mut self) -> u32 {
        self.rng
            .gen_range(self.cfg.user_count_min..=self.cfg.user_count_max)
    }

    fn sample_power_state(&mut self, previous_on_ac: bool, previous_battery: f64) -> (bool, f64) {
        let on_ac = if self.rng.gen_bool(self.cfg.ac_flip_probability) {
            !previous_on_ac
        } else {
            previous_on_ac
        };

        let step = self
            .rng
            .gen_range(self.cfg.battery_step_min..=self.cfg.battery_step_max);
        let battery = if on_ac {
            (previous_battery + step).min(100.0)
        } else {
            (previous_battery - step).max(0.0)
        };

        (on_ac, battery)
    }

    fn jitter_around(&mut self, base: f64, jitter: f64) -> f64 {
        let offset = self.rng.gen_range(-jitter..=jitter);
        clamp01(base + offset)
    }
}

impl Sampler for SimulatedSampler {
    fn sample(&mut self, previous: &SystemState) -> MetricsReading {
        let cpu_usage = self.sample_cpu_usage(previous.cpu_usage);
        let memory_usage = self.sample_memory_usage();
        let io_usage = self.sample_io_usage();
        let network_usage = self.sample_network_usage();
        let process_count = self.sample_process_count();
        let user_count = self.sample_user_count();
        let (on_ac_power, battery_level) =
            self.sample_power_state(previous.on_ac_power, previous.battery_level);

        MetricsReading {
            cpu_usage,
            memory_usage,
            io_usage,
            network_usage,
            process_count,
            user_count,
            battery_level,
            on_ac_power,
        }
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

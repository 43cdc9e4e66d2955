use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub interval_ms: u64,
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Параметры имитации метрик: ограниченное случайное блуждание CPU,
/// дрожание остальных метрик вокруг фиксированных середин, редкие
/// переключения питания.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplerConfig {
    #[serde(default = "default_cpu_step")]
    pub cpu_step: f64,
    #[serde(default = "default_cpu_floor")]
    pub cpu_floor: f64,
    #[serde(default = "default_cpu_ceiling")]
    pub cpu_ceiling: f64,
    #[serde(default = "default_memory_base")]
    pub memory_base: f64,
    #[serde(default = "default_memory_jitter")]
    pub memory_jitter: f64,
    #[serde(default = "default_io_base")]
    pub io_base: f64,
    #[serde(default = "default_io_jitter")]
    pub io_jitter: f64,
    #[serde(default = "default_network_base")]
    pub network_base: f64,
    #[serde(default = "default_network_jitter")]
    pub network_jitter: f64,
    #[serde(default = "default_process_count_min")]
    pub process_count_min: u32,
    #[serde(default = "default_process_count_max")]
    pub process_count_max: u32,
    #[serde(default = "default_user_count_min")]
    pub user_count_min: u32,
    #[serde(default = "default_user_count_max")]
    pub user_count_max: u32,
    #[serde(default = "default_ac_flip_probability")]
    pub ac_flip_probability: f64,
    #[serde(default = "default_battery_step_min")]
    pub battery_step_min: f64,
    #[serde(default = "default_battery_step_max")]
    pub battery_step_max: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cpu_step: default_cpu_step(),
            cpu_floor: default_cpu_floor(),
            cpu_ceiling: default_cpu_ceiling(),
            memory_base: default_memory_base(),
            memory_jitter: default_memory_jitter(),
            io_base: default_io_base(),
            io_jitter: default_io_jitter(),
            network_base: default_network_base(),
            network_jitter: default_network_jitter(),
            process_count_min: default_process_count_min(),
            process_count_max: default_process_count_max(),
            user_count_min: default_user_count_min(),
            user_count_max: default_user_count_max(),
            ac_flip_probability: default_ac_flip_probability(),
            battery_step_min: default_battery_step_min(),
            battery_step_max: default_battery_step_max(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms < 1 {
            return Err(ConfigError::Validation(
                "interval_ms должно быть >= 1".to_string(),
            ));
        }

        validate_sampler(&self.sampler)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_sampler(cfg: &SamplerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("sampler.cpu_floor", cfg.cpu_floor),
        ("sampler.cpu_ceiling", cfg.cpu_ceiling),
        ("sampler.memory_base", cfg.memory_base),
        ("sampler.io_base", cfg.io_base),
        ("sampler.network_base", cfg.network_base),
        ("sampler.ac_flip_probability", cfg.ac_flip_probability),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{name} должно быть в диапазоне 0..1"
            )));
        }
    }

    for (name, value) in [
        ("sampler.cpu_step", cfg.cpu_step),
        ("sampler.memory_jitter", cfg.memory_jitter),
        ("sampler.io_jitter", cfg.io_jitter),
        ("sampler.network_jitter", cfg.network_jitter),
        ("sampler.battery_step_min", cfg.battery_step_min),
        ("sampler.battery_step_max", cfg.battery_step_max),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{name} должно быть неотрицательным числом"
            )));
        }
    }

    if cfg.cpu_floor > cfg.cpu_ceiling {
        return Err(ConfigError::Validation(
            "sampler.cpu_floor должно быть <= sampler.cpu_ceiling".to_string(),
        ));
    }
    if cfg.process_count_min > cfg.process_count_max {
        return Err(ConfigError::Validation(
            "sampler.process_count_min должно быть <= sampler.process_count_max".to_string(),
        ));
    }
    if cfg.user_count_min > cfg.user_count_max {
        return Err(ConfigError::Validation(
            "sampler.user_count_min должно быть <= sampler.user_count_max".to_string(),
        ));
    }
    if cfg.battery_step_min > cfg.battery_step_max {
        return Err(ConfigError::Validation(
            "sampler.battery_step_min должно быть <= sampler.battery_step_max".to_string(),
        ));
    }

    Ok(())
}

const fn default_status_interval_secs() -> u64 {
    30
}

const fn default_cpu_step() -> f64 {
    0.05
}

const fn default_cpu_floor() -> f64 {
    0.05
}

const fn default_cpu_ceiling() -> f64 {
    0.95
}

const fn default_memory_base() -> f64 {
    0.40
}

const fn default_memory_jitter() -> f64 {
    0.05
}

const fn default_io_base() -> f64 {
    0.20
}

const fn default_io_jitter() -> f64 {
    0.05
}

const fn default_network_base() -> f64 {
    0.10
}

const fn default_network_jitter() -> f64 {
    0.025
}

const fn default_process_count_min() -> u32 {
    50
}

const fn default_process_count_max() -> u32 {
    59
}

const fn default_user_count_min() -> u32 {
    1
}

const fn default_user_count_max() -> u32 {
    2
}

const fn default_ac_flip_probability() -> f64 {
    0.1
}

const fn default_battery_step_min() -> f64 {
    0.1
}

const fn default_battery_step_max() -> f64 {
    0.2
}

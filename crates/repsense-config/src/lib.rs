mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Returns the config directory: <platform config dir>/repsense/
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("repsense");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: <platform config dir>/repsense/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from the default location, or return defaults if not found.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

/// Load config from `path`, or return defaults if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

/// Save config to the default location.
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let path = config_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use repsense_features::FeatureLayout;
    use repsense_imu::{FilterAlgorithm, GyroUnit};

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [sensor]
            sample_rate_hz = 50.0
            gyro_unit = "degrees_per_second"

            [fusion.algorithm]
            kind = "mahony"
            kp = 1.5
            ki = 0.05

            [features]
            layout = "extended"
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.sample_rate_hz, 50.0);
        assert_eq!(config.sensor.gyro_unit, GyroUnit::DegreesPerSecond);
        assert_eq!(config.fusion.algorithm, FilterAlgorithm::Mahony { kp: 1.5, ki: 0.05 });
        assert!(config.fusion.use_magnetometer);
        assert_eq!(config.features.layout, FeatureLayout::Extended);
        assert_eq!(config.features.window_duration_s, 0.5);
        assert_eq!(config.session.labels.rest, Some(4));
        config.validate().unwrap();
    }

    #[test]
    fn saved_file_loads_back() {
        let mut config = AppConfig::default();
        config.fusion.algorithm = FilterAlgorithm::Complementary { alpha: 0.95 };
        config.simulation.motion_axis = Vec3::new(0.0, 1.0, 0.0);
        config.session.reps.cooldown_s = 1.2;

        let path = std::env::temp_dir().join(format!("repsense-config-{}.toml", std::process::id()));
        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.fusion.algorithm, config.fusion.algorithm);
        assert_eq!(loaded.simulation.motion_axis, Vec3::Y);
        assert_eq!(loaded.session.reps.cooldown_s, 1.2);
        assert_eq!(loaded.sensor.mount_rotation, config.sensor.mount_rotation);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("repsense-config-does-not-exist.toml");
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.sensor.sample_rate_hz, 100.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases: [fn(&mut AppConfig); 7] = [
            |c| c.sensor.sample_rate_hz = 0.0,
            |c| c.features.window_duration_s = -1.0,
            |c| c.features.smoothing_factor = 1.0,
            |c| c.session.gate.exit_threshold = 0.9,
            |c| c.session.gate.entry_threshold = 1.5,
            |c| c.session.labels.rest = Some(5),
            |c| c.fusion.algorithm = FilterAlgorithm::Mahony { kp: -1.0, ki: 0.0 },
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "case {i} accepted");
        }

        let mut config = AppConfig::default();
        config.session.labels.names.clear();
        config.session.labels.rest = None;
        assert!(config.validate().is_err());
    }
}

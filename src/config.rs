//! Mapper configuration.
//!
//! All geometry and algorithm parameters for [`DynamicMap`](crate::DynamicMap)
//! live here. Defaults match a long-range outdoor 3D lidar; indoor 2D setups
//! typically shrink `cell_size` and `sensor_max_range`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the dynamic map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Edge length of a grid cell in meters.
    /// Default: 20.0
    pub cell_size: f32,

    /// Hysteresis padding around the sensor-range rectangle, in cells.
    /// Cells are kept loaded this far beyond the sensor range so small pose
    /// jitter does not thrash the store.
    /// Default: 1
    pub buffer_size: i32,

    /// Minimum distance from an existing map point before an input point is
    /// appended to the active cloud (meters).
    /// Default: 0.15
    pub min_dist_new_point: f32,

    /// Sensor range in meters. Beyond this no cell is loaded and the
    /// dynamic-probability update ignores map points.
    /// Default: 80.0
    pub sensor_max_range: f32,

    /// Initial dynamic probability assigned to new points.
    /// Default: 0.6
    pub prior_dynamic: f32,

    /// Once a point's dynamic probability reaches this threshold it latches
    /// toward dynamic.
    /// Default: 0.9
    pub threshold_dynamic: f32,

    /// Half aperture of a lidar beam in radians. Angular matches are accepted
    /// within twice this value.
    /// Default: 0.01
    pub beam_half_angle: f32,

    /// Relative range tolerance of the visibility model.
    /// Default: 0.01
    pub epsilon_a: f32,

    /// Absolute range tolerance of the visibility model (meters).
    /// Default: 0.01
    pub epsilon_d: f32,

    /// Odds update weight for dynamic evidence.
    /// Default: 0.8
    pub alpha: f32,

    /// Odds update weight for static evidence.
    /// Default: 0.99
    pub beta: f32,

    /// 3D mode: the aisle (z) grid axis is live. In 2D mode aisles collapse
    /// to index 0.
    /// Default: true
    pub is_3d: bool,

    /// Online mode: spawn the background update worker. Offline, cell jobs
    /// run synchronously on the caller's thread.
    /// Default: true
    pub is_online: bool,

    /// Enable the dynamic-probability update during scan integration.
    /// Default: false
    pub compute_prob_dynamic: bool,

    /// Persist evicted cells on disk instead of RAM.
    /// Default: false
    pub save_cells_on_hard_drive: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cell_size: 20.0,
            buffer_size: 1,
            min_dist_new_point: 0.15,
            sensor_max_range: 80.0,
            prior_dynamic: 0.6,
            threshold_dynamic: 0.9,
            beam_half_angle: 0.01,
            epsilon_a: 0.01,
            epsilon_d: 0.01,
            alpha: 0.8,
            beta: 0.99,
            is_3d: true,
            is_online: true,
            compute_prob_dynamic: false,
            save_cells_on_hard_drive: false,
        }
    }
}

impl MapperConfig {
    /// Check parameter ranges, returning a configuration error on the first
    /// violation.
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size > 0.0) {
            return Err(Error::Config(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.buffer_size < 1 {
            return Err(Error::Config(format!(
                "buffer_size must be at least 1, got {}",
                self.buffer_size
            )));
        }
        if self.sensor_max_range <= 0.0 {
            return Err(Error::Config(format!(
                "sensor_max_range must be positive, got {}",
                self.sensor_max_range
            )));
        }
        if self.min_dist_new_point < 0.0 {
            return Err(Error::Config(format!(
                "min_dist_new_point must not be negative, got {}",
                self.min_dist_new_point
            )));
        }
        if !(0.0..=1.0).contains(&self.prior_dynamic) {
            return Err(Error::Config(format!(
                "prior_dynamic must be in [0, 1], got {}",
                self.prior_dynamic
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold_dynamic) {
            return Err(Error::Config(format!(
                "threshold_dynamic must be in [0, 1], got {}",
                self.threshold_dynamic
            )));
        }
        if self.beam_half_angle <= 0.0 {
            return Err(Error::Config(format!(
                "beam_half_angle must be positive, got {}",
                self.beam_half_angle
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MapperConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_cell_size() {
        let config = MapperConfig {
            cell_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let config = MapperConfig {
            buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_prior() {
        let config = MapperConfig {
            prior_dynamic: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Estimated time and cost saved by AI-assisted development.
//!
//! ```text
//! manual hours = dev hours × multiplier
//! time saved   = manual hours − dev hours
//! cost savings = time saved × hourly rate
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ratio of manual effort to AI-assisted effort.
pub const DEFAULT_MULTIPLIER: f64 = 2.5;

/// Default hourly rate, in currency units.
pub const DEFAULT_HOURLY_RATE: f64 = 75.0;

/// Invalid ROI settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A multiplier below 1 would mean negative time saved.
    #[error("multiplier must be a finite number of at least 1, got {0}")]
    Multiplier(f64),
    /// The hourly rate must be a finite non-negative amount.
    #[error("hourly rate must be a finite non-negative number, got {0}")]
    HourlyRate(f64),
}

/// Inputs to the ROI formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiConfig {
    pub multiplier: f64,
    pub hourly_rate: f64,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            hourly_rate: DEFAULT_HOURLY_RATE,
        }
    }
}

impl RoiConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigurationError::Multiplier(self.multiplier));
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(ConfigurationError::HourlyRate(self.hourly_rate));
        }
        Ok(())
    }
}

/// Output of [`roi`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiEstimate {
    pub dev_hours: f64,
    pub multiplier: f64,
    pub hourly_rate: f64,
    pub manual_hours_estimate: f64,
    pub time_saved: f64,
    pub cost_savings: f64,
    pub efficiency_gain_percent: f64,
}

/// Computes the ROI estimate for `dev_hours` of assisted development.
pub fn roi(dev_hours: f64, config: RoiConfig) -> Result<RoiEstimate, ConfigurationError> {
    config.validate()?;
    let manual_hours_estimate = dev_hours * config.multiplier;
    let time_saved = manual_hours_estimate - dev_hours;
    Ok(RoiEstimate {
        dev_hours,
        multiplier: config.multiplier,
        hourly_rate: config.hourly_rate,
        manual_hours_estimate,
        time_saved,
        cost_savings: time_saved * config.hourly_rate,
        efficiency_gain_percent: (config.multiplier - 1.0) * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::float_cmp, reason = "values are exactly representable")]
    fn forty_hours_at_defaults() {
        let estimate = roi(40.0, RoiConfig::default()).unwrap();
        assert_eq!(estimate.manual_hours_estimate, 100.0);
        assert_eq!(estimate.time_saved, 60.0);
        assert_eq!(estimate.cost_savings, 4500.0);
        assert_eq!(estimate.efficiency_gain_percent, 150.0);
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "values are exactly representable")]
    fn multiplier_of_one_saves_nothing() {
        let config = RoiConfig {
            multiplier: 1.0,
            hourly_rate: 100.0,
        };
        let estimate = roi(12.0, config).unwrap();
        assert_eq!(estimate.time_saved, 0.0);
        assert_eq!(estimate.cost_savings, 0.0);
    }

    #[test]
    fn rejects_multiplier_below_one() {
        for multiplier in [0.5, 0.0, -2.0, f64::NAN] {
            let config = RoiConfig {
                multiplier,
                ..RoiConfig::default()
            };
            assert!(matches!(
                roi(10.0, config),
                Err(ConfigurationError::Multiplier(_))
            ));
        }
    }

    #[test]
    fn rejects_negative_rate() {
        let config = RoiConfig {
            hourly_rate: -1.0,
            ..RoiConfig::default()
        };
        assert_eq!(roi(10.0, config), Err(ConfigurationError::HourlyRate(-1.0)));
    }
}

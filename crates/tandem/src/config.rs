//! System configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Seconds an optimistic event stays pending when no lifetime is configured.
pub const DEFAULT_OPTIMISTIC_LIFETIME_SECS: f64 = 10.0;

/// Settings a host can load from its own config source.
///
/// ```ignore
/// let config: SystemConfig = serde_json::from_str(r#"{ "optimistic_lifetime_secs": 0.5 }"#)?;
/// let system = SystemBuilder::new(State::default()).with_config(&config).build();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seconds before an unconfirmed optimistic event expires.
    ///
    /// Fractional and non-positive values are allowed; zero or less makes new
    /// entries expire immediately.
    pub optimistic_lifetime_secs: f64,
}

impl SystemConfig {
    pub fn optimistic_lifetime(&self) -> Duration {
        lifetime_from_secs(self.optimistic_lifetime_secs)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            optimistic_lifetime_secs: DEFAULT_OPTIMISTIC_LIFETIME_SECS,
        }
    }
}

/// Convert fractional seconds to a `Duration`, at millisecond precision.
///
/// Values beyond what `Duration` can hold saturate to `Duration::MAX` or
/// `Duration::MIN`, so an infinite lifetime never expires. NaN becomes zero,
/// which expires immediately.
pub fn lifetime_from_secs(secs: f64) -> Duration {
    if secs.is_nan() {
        return Duration::zero();
    }
    let saturated = if secs < 0.0 { Duration::MIN } else { Duration::MAX };
    // `as` saturates at the i64 bounds
    Duration::try_milliseconds((secs * 1000.0).round() as i64).unwrap_or(saturated)
}

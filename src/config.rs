use crate::calibration::{Calibration, ReportingMode};
use crate::protocol::{COORD_MAX, COORD_MIN};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Serial device used when none is configured
pub const DEFAULT_DEVICE: &str = "/dev/ttyS0";

/// Per-device driver options.
///
/// Field names in option files follow the usual touchscreen driver options
/// (`Device`, `MinX`, `ReportingMode`, ...). Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct DriverOptions {
    /// Identifier used in logs and as the virtual device name
    pub name: String,
    /// Serial device path
    pub device: PathBuf,
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    /// Display the touchscreen is mounted on
    pub screen_number: u32,
    pub screen_width: i32,
    pub screen_height: i32,
    /// Logical button reported for touches
    pub button_number: u32,
    pub reporting_mode: ReportingMode,
    #[serde(alias = "Rotate")]
    pub swap_axes: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        let calibration = Calibration::default();
        Self {
            name: "inexio touchscreen".to_string(),
            device: PathBuf::from(DEFAULT_DEVICE),
            min_x: COORD_MIN,
            max_x: COORD_MAX,
            min_y: COORD_MIN,
            max_y: COORD_MAX,
            screen_number: 0,
            screen_width: calibration.screen_width,
            screen_height: calibration.screen_height,
            button_number: 1,
            reporting_mode: ReportingMode::Scaled,
            swap_axes: false,
        }
    }
}

impl DriverOptions {
    /// Load options from a JSON file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Invalid options file {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device.as_os_str().is_empty() {
            anyhow::bail!("{}: no device configured", self.name);
        }
        if self.button_number == 0 {
            anyhow::bail!("{}: ButtonNumber must be at least 1", self.name);
        }
        self.calibration()
            .validate()
            .with_context(|| format!("{}: invalid calibration", self.name))
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            min_x: self.min_x,
            max_x: self.max_x,
            min_y: self.min_y,
            max_y: self.max_y,
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            swap_axes: self.swap_axes,
            mode: self.reporting_mode,
        }
    }
}

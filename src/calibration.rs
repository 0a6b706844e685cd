use crate::protocol::{COORD_MAX, COORD_MIN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How coordinates are reported to the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReportingMode {
    /// Map the calibration range onto the screen
    #[default]
    Scaled,
    /// Report calibration-space values untouched
    Raw,
}

impl FromStr for ReportingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "scaled" => Ok(Self::Scaled),
            other => anyhow::bail!("Unknown reporting mode: {}", other),
        }
    }
}

impl TryFrom<String> for ReportingMode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportingMode> for String {
    fn from(mode: ReportingMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ReportingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaled => write!(f, "scaled"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// Calibration bounds and target geometry of one touchscreen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    pub swap_axes: bool,
    pub mode: ReportingMode,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_x: COORD_MIN,
            max_x: COORD_MAX,
            min_y: COORD_MIN,
            max_y: COORD_MAX,
            screen_width: 1920,
            screen_height: 1080,
            swap_axes: false,
            mode: ReportingMode::Scaled,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_x == self.max_x {
            anyhow::bail!("MinX and MaxX are both {}", self.min_x);
        }
        if self.min_y == self.max_y {
            anyhow::bail!("MinY and MaxY are both {}", self.min_y);
        }
        if self.screen_width <= 0 || self.screen_height <= 0 {
            anyhow::bail!(
                "Invalid screen size {}x{}",
                self.screen_width,
                self.screen_height
            );
        }
        Ok(())
    }

    /// Turn a raw device position into the position reported to the host
    pub fn apply(&self, raw_x: i32, raw_y: i32) -> (i32, i32) {
        let (x, y) = match self.mode {
            ReportingMode::Raw => (raw_x, raw_y),
            ReportingMode::Scaled => (
                scale_axis(raw_x, self.min_x, self.max_x, self.screen_width),
                scale_axis(raw_y, self.min_y, self.max_y, self.screen_height),
            ),
        };

        if self.swap_axes { (y, x) } else { (x, y) }
    }

    /// Inclusive (min, max) of the reported X and Y values
    pub fn output_ranges(&self) -> ((i32, i32), (i32, i32)) {
        let (x, y) = match self.mode {
            ReportingMode::Raw => (
                (self.min_x.min(self.max_x), self.min_x.max(self.max_x)),
                (self.min_y.min(self.max_y), self.min_y.max(self.max_y)),
            ),
            ReportingMode::Scaled => ((0, self.screen_width), (0, self.screen_height)),
        };

        if self.swap_axes { (y, x) } else { (x, y) }
    }
}

/// Map `value` from `[from_min, from_max]` onto `[0, to_max]`.
///
/// Inverted calibration bounds flip the axis. The result is clamped, so
/// touches outside the calibrated area stick to the screen edge.
pub fn scale_axis(value: i32, from_min: i32, from_max: i32, to_max: i32) -> i32 {
    let from_width = i64::from(from_max) - i64::from(from_min);
    if from_width == 0 {
        return 0;
    }

    let scaled = i64::from(to_max) * (i64::from(value) - i64::from(from_min)) / from_width;
    scaled.clamp(0, i64::from(to_max)) as i32
}

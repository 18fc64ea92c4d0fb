//! Start-up configuration.

use focalraw_core::pad::PAD_CHANNELS;
use focalraw_core::{Error, Result};
use focalraw_decode::MappingVariant;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Channels whose raw ADC is always projected.
pub const DEFAULT_PROJECTION_CHANNELS: [usize; 7] = [14, 16, 19, 42, 46, 52, 59];

/// Largest accepted TOT cut. TOT is a 12-bit field.
pub const MAX_TOT_CUT: u16 = 4096;

/// Monitor configuration, consumed once at start-up.
///
/// Unknown keys are rejected so that a misspelled option fails loudly
/// instead of silently keeping its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Chip layout of the pixel layers.
    pub pixel_layout: MappingVariant,
    /// Pad channels with TOT below this value carry a valid ADC.
    pub pad_tot_cut: u16,
    pub subtract_pad_pedestals: bool,
    pub mask_pad_bad_channels: bool,
    pub disable_pads: bool,
    pub disable_pixels: bool,
    /// Extra channels for the raw ADC projections.
    pub pad_projection_channels: Vec<usize>,
    /// Dump every page header at info level.
    pub debug: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pixel_layout: MappingVariant::Ib,
            pad_tot_cut: 10,
            subtract_pad_pedestals: false,
            mask_pad_bad_channels: false,
            disable_pads: false,
            disable_pixels: false,
            pad_projection_channels: Vec::new(),
            debug: false,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pixel_layout(mut self, layout: MappingVariant) -> Self {
        self.pixel_layout = layout;
        self
    }

    #[must_use]
    pub fn with_pad_tot_cut(mut self, cut: u16) -> Self {
        self.pad_tot_cut = cut;
        self
    }

    #[must_use]
    pub fn with_pedestal_subtraction(mut self, enabled: bool) -> Self {
        self.subtract_pad_pedestals = enabled;
        self
    }

    #[must_use]
    pub fn with_bad_channel_masking(mut self, enabled: bool) -> Self {
        self.mask_pad_bad_channels = enabled;
        self
    }

    #[must_use]
    pub fn with_pads_disabled(mut self, disabled: bool) -> Self {
        self.disable_pads = disabled;
        self
    }

    #[must_use]
    pub fn with_pixels_disabled(mut self, disabled: bool) -> Self {
        self.disable_pixels = disabled;
        self
    }

    #[must_use]
    pub fn with_projection_channels(mut self, channels: Vec<usize>) -> Self {
        self.pad_projection_channels = channels;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails [`validate`](Self::validate).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration string.
    ///
    /// # Errors
    /// Returns an error if the string does not parse or fails
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and option combinations.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.pad_tot_cut > MAX_TOT_CUT {
            return Err(Error::Config(format!(
                "pad_tot_cut {} exceeds {MAX_TOT_CUT}",
                self.pad_tot_cut
            )));
        }
        if self.disable_pads && self.disable_pixels {
            return Err(Error::Config(
                "pads and pixels are both disabled, nothing to monitor".into(),
            ));
        }
        if let Some(ch) = self
            .pad_projection_channels
            .iter()
            .find(|&&ch| ch >= PAD_CHANNELS)
        {
            return Err(Error::Config(format!(
                "projection channel {ch} is not a regular pad channel (0..{PAD_CHANNELS})"
            )));
        }
        Ok(())
    }

    /// Configured projection channels merged with the defaults, sorted
    /// and without duplicates.
    #[must_use]
    pub fn projection_channels(&self) -> Vec<usize> {
        let mut channels: Vec<usize> = DEFAULT_PROJECTION_CHANNELS
            .iter()
            .chain(&self.pad_projection_channels)
            .copied()
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.pixel_layout, MappingVariant::Ib);
        assert_eq!(config.pad_tot_cut, 10);
        assert!(config.validate().is_ok());
        assert_eq!(config.projection_channels(), DEFAULT_PROJECTION_CHANNELS.to_vec());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MonitorConfig::from_json(r#"{"pixel_layout": "OB", "pad_tot_cut": 50}"#).unwrap();
        assert_eq!(config.pixel_layout, MappingVariant::Ob);
        assert_eq!(config.pad_tot_cut, 50);
        assert!(!config.subtract_pad_pedestals);
    }

    #[test]
    fn test_unknown_layout_rejected() {
        assert!(MonitorConfig::from_json(r#"{"pixel_layout": "MB"}"#).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(MonitorConfig::from_json(r#"{"pad_tot_cutt": 5}"#).is_err());
    }

    #[test]
    fn test_invalid_combinations() {
        let both = MonitorConfig::new()
            .with_pads_disabled(true)
            .with_pixels_disabled(true);
        assert!(matches!(both.validate(), Err(Error::Config(_))));

        let cut = MonitorConfig::new().with_pad_tot_cut(5000);
        assert!(matches!(cut.validate(), Err(Error::Config(_))));

        let channel = MonitorConfig::new().with_projection_channels(vec![76]);
        assert!(matches!(channel.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_projection_channels_merged() {
        let config = MonitorConfig::new().with_projection_channels(vec![70, 14, 3]);
        assert_eq!(
            config.projection_channels(),
            vec![3, 14, 16, 19, 42, 46, 52, 59, 70]
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"mask_pad_bad_channels": true, "debug": true}}"#).unwrap();
        file.flush().unwrap();
        let config = MonitorConfig::from_file(file.path()).unwrap();
        assert!(config.mask_pad_bad_channels);
        assert!(config.debug);
    }
}

//! File-backed configuration store
//!
//! Keeps the last document that passed validation in memory and hands the
//! controller fresh copies of it on every request. Edits are validated first,
//! then written to disk, and only then become visible to the controller, so a
//! rejected edit or a failed write leaves the running configuration as it was.
//!
//! Writes go to a sibling temp file which is renamed over the settings file,
//! so a power cut mid-write never leaves a truncated document behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use o2trim_core::{ChannelCalibration, ConfigStore, ControllerConfig, FeedForwardTable, PidConfig};

use crate::document::{ChannelSection, PidSection, SettingsDocument, TablePoint};
use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate, ValidationReport};

pub struct JsonConfigStore {
    path: PathBuf,
    document: SettingsDocument,
    config: ControllerConfig,
}

impl JsonConfigStore {
    /// Load the settings file, creating it with factory defaults when absent
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();

        if !path.exists() {
            info!("{} not found, writing factory defaults", path.display());
            let store = Self {
                document: SettingsDocument::default(),
                config: ControllerConfig::default(),
                path,
            };
            store.save()?;
            return Ok(store);
        }

        let (document, config, report) = load(&path)?;
        log_report(&path, &report);
        Ok(Self { path, document, config })
    }

    /// Re-read the file, keeping the current configuration if it fails
    pub fn reload(&mut self) -> ConfigResult<ValidationReport> {
        let (document, config, report) = load(&self.path)?;
        log_report(&self.path, &report);
        self.document = document;
        self.config = config;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace one channel calibration.
    ///
    /// The edit goes through [`ChannelSection::edited_over`] first, so blank
    /// labels and an empty or inverted voltage range are repaired before
    /// validation.
    pub fn update_channel(&mut self, index: usize, section: ChannelSection) -> ConfigResult<ValidationReport> {
        let mut document = self.document.clone();
        let slot = document.channel_mut(index).ok_or(ConfigError::UnknownChannel(index))?;
        *slot = section.edited_over(slot);
        self.commit(document)
    }

    /// Replace the feed-forward table
    pub fn update_feed_forward(&mut self, points: Vec<TablePoint>) -> ConfigResult<ValidationReport> {
        let mut document = self.document.clone();
        document.air_fuel_table = points;
        self.commit(document)
    }

    /// Replace the regulator section
    pub fn update_pid(&mut self, pid: PidSection) -> ConfigResult<ValidationReport> {
        let mut document = self.document.clone();
        document.pid_control = pid;
        self.commit(document)
    }

    /// Write the current document atomically
    pub fn save(&self) -> ConfigResult<()> {
        write_atomic(&self.path, &self.document)
    }

    fn commit(&mut self, document: SettingsDocument) -> ConfigResult<ValidationReport> {
        let validated = validate(&document).map_err(ConfigError::Invalid)?;
        write_atomic(&self.path, &document)?;
        log_report(&self.path, &validated.report);
        self.document = document;
        self.config = validated.config;
        Ok(validated.report)
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_calibration(&self) -> [ChannelCalibration; 4] {
        self.config.channels.clone()
    }

    fn get_feed_forward_table(&self) -> FeedForwardTable {
        self.config.feed_forward.clone()
    }

    fn get_pid_config(&self) -> PidConfig {
        self.config.pid
    }
}

fn load(path: &Path) -> ConfigResult<(SettingsDocument, ControllerConfig, ValidationReport)> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let document = SettingsDocument::from_json(&text)?;
    let validated = validate(&document).map_err(ConfigError::Invalid)?;
    Ok((document, validated.config, validated.report))
}

fn log_report(path: &Path, report: &ValidationReport) {
    for issue in &report.warnings {
        warn!("{}: {}", path.display(), issue);
    }
}

fn write_atomic(path: &Path, document: &SettingsDocument) -> ConfigResult<()> {
    let json = document.to_json()?;
    let tmp = temp_path(path);

    let write = || -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ConfigError::io(path, e)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

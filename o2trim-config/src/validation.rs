//! Load-time validation of the settings document
//!
//! Parsing only proves the document is complete. Validation decides whether
//! it can drive the controller and turns it into the core's typed
//! [`ControllerConfig`]. Problems are collected into a [`ValidationReport`]
//! instead of stopping at the first one, so an operator sees everything wrong
//! with an edited document at once.
//!
//! | Check                                   | Severity |
//! |-----------------------------------------|----------|
//! | non-finite number anywhere              | Error    |
//! | feed-forward table not 5 points         | Error    |
//! | feed-forward gas not strictly ascending | Error    |
//! | PID section unusable (`PidConfig::validate`) | Error |
//! | calibration `v_min == v_max` (nudged)   | Warning  |
//! | calibration `y_min == y_max`            | Warning  |
//! | setpoint outside 0..=21 % O2            | Warning  |
//! | impulse not shorter than interval       | Warning  |
//! | label longer than the core keeps        | Info     |
//! | air target falls with rising gas        | Info     |

use std::fmt;

use o2trim_core::{
    ChannelCalibration, ControlError, ControllerConfig, FeedForwardPoint, FeedForwardTable,
    PidConfig,
};

use crate::document::{ChannelSection, SettingsDocument};

/// Points the stored table must have
pub const TABLE_POINTS: usize = 5;

/// Longest label the core keeps without truncating
const LABEL_CAPACITY: usize = 24;

/// Highest oxygen reading that makes sense (ambient air)
const O2_AMBIENT_PERCENT: f32 = 21.0;

/// Validation report containing all issues found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Must be fixed before the document can load
    pub errors: Vec<ValidationIssue>,
    /// Loaded, but should be reviewed
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// No errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Info => self.info.push(issue),
        }
    }

    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.info.len()
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(&self.warnings).chain(&self.info)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        for issue in &self.errors {
            write!(f, "; {}", issue)?;
        }
        Ok(())
    }
}

/// Individual validation issue
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub issue_type: IssueType,
    /// Dotted path of the offending field
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn new(issue_type: IssueType, severity: Severity, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            field: field.into(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    /// NaN or infinite number
    NotFinite,
    /// Zero-width calibration range
    DegenerateRange,
    /// Wrong number of table points
    TableSize,
    /// Table gas values not strictly ascending
    TableOrder,
    /// Value the controller cannot run with
    InvalidValue,
    /// Unusual but usable value
    UnusualValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A document that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub config: ControllerConfig,
    /// Warnings and info found on the way
    pub report: ValidationReport,
}

/// Validate a parsed document and build the controller configuration
pub fn validate(doc: &SettingsDocument) -> Result<Validated, ValidationReport> {
    let mut report = ValidationReport::new();

    let channels = doc.channels();
    for (index, section) in channels.iter().enumerate() {
        check_channel(index, section, &mut report);
    }

    let table = check_table(doc, &mut report);
    let pid = check_pid(doc, &mut report);

    if !report.is_valid() {
        return Err(report);
    }

    match (table, pid) {
        (Some(feed_forward), Some(pid)) => {
            let channels: [ChannelCalibration; 4] = channels.map(ChannelSection::to_calibration);
            Ok(Validated {
                config: ControllerConfig { channels, feed_forward, pid },
                report,
            })
        }
        _ => Err(report),
    }
}

fn check_channel(index: usize, section: &ChannelSection, report: &mut ValidationReport) {
    let field = |name: &str| format!("ch{}.{}", index, name);

    let numbers = [
        ("v_min", section.v_min),
        ("v_max", section.v_max),
        ("y_min", section.y_min),
        ("y_max", section.y_max),
    ];
    for (name, value) in numbers {
        if !value.is_finite() {
            report.add(ValidationIssue::new(
                IssueType::NotFinite,
                Severity::Error,
                field(name),
                format!("{} is not a finite number", value),
            ));
        }
    }

    if section.v_min == section.v_max {
        report.add(ValidationIssue::new(
            IssueType::DegenerateRange,
            Severity::Warning,
            field("v_max"),
            format!("v_min == v_max == {}, v_max nudged up", section.v_min),
        ));
    }
    if section.y_min == section.y_max {
        report.add(ValidationIssue::new(
            IssueType::DegenerateRange,
            Severity::Warning,
            field("y_max"),
            "y_min == y_max, channel always reads the same value",
        ));
    }

    for (name, text) in [("name", &section.name), ("unit", &section.unit)] {
        if text.chars().count() > LABEL_CAPACITY {
            report.add(ValidationIssue::new(
                IssueType::UnusualValue,
                Severity::Info,
                field(name),
                format!("longer than {} characters, will be truncated", LABEL_CAPACITY),
            ));
        }
    }
}

fn check_table(doc: &SettingsDocument, report: &mut ValidationReport) -> Option<FeedForwardTable> {
    let points = &doc.air_fuel_table;

    if points.len() != TABLE_POINTS {
        report.add(ValidationIssue::new(
            IssueType::TableSize,
            Severity::Error,
            "air_fuel_table",
            format!("expected {} points, found {}", TABLE_POINTS, points.len()),
        ));
        return None;
    }

    let points: Vec<FeedForwardPoint> = points.iter().copied().map(FeedForwardPoint::from).collect();

    let table = match FeedForwardTable::new(&points) {
        Ok(table) => table,
        Err(ControlError::UnsortedTable { index }) => {
            report.add(ValidationIssue::new(
                IssueType::TableOrder,
                Severity::Error,
                format!("air_fuel_table[{}].gas", index),
                format!(
                    "gas {} not above previous {}",
                    points[index].gas,
                    points[index - 1].gas
                ),
            ));
            return None;
        }
        Err(e) => {
            report.add(ValidationIssue::new(
                IssueType::NotFinite,
                Severity::Error,
                "air_fuel_table",
                e.to_string(),
            ));
            return None;
        }
    };

    for (index, pair) in points.windows(2).enumerate() {
        if pair[1].air_target < pair[0].air_target {
            report.add(ValidationIssue::new(
                IssueType::UnusualValue,
                Severity::Info,
                format!("air_fuel_table[{}].air_target", index + 1),
                "air target falls as gas flow rises",
            ));
        }
    }

    Some(table)
}

fn check_pid(doc: &SettingsDocument, report: &mut ValidationReport) -> Option<PidConfig> {
    let pid = PidConfig::from(&doc.pid_control);

    if let Err(e) = pid.validate() {
        let issue_type = match e {
            ControlError::InvalidConfig { reason } if reason.contains("finite") => IssueType::NotFinite,
            _ => IssueType::InvalidValue,
        };
        report.add(ValidationIssue::new(issue_type, Severity::Error, "pid_control", e.to_string()));
        return None;
    }

    if !(0.0..=O2_AMBIENT_PERCENT).contains(&pid.o2_setpoint) {
        report.add(ValidationIssue::new(
            IssueType::UnusualValue,
            Severity::Warning,
            "pid_control.o2_setpoint",
            format!("{} % O2 is outside 0..={}", pid.o2_setpoint, O2_AMBIENT_PERCENT),
        ));
    }
    if pid.impulse_duration_s >= pid.control_interval_s {
        report.add(ValidationIssue::new(
            IssueType::UnusualValue,
            Severity::Warning,
            "pid_control.impulse_duration",
            "pulse lasts into the next control cycle",
        ));
    }

    Some(pid)
}

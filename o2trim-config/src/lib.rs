//! Settings document for the O2Trim controller
//!
//! The control core never touches files or JSON. This crate is the other
//! side of its `ConfigStore` port:
//!
//! - [`document`]: the JSON layout as stored on the device
//! - [`validation`]: load-time checks producing a typed `ControllerConfig`
//! - [`store`]: a file-backed `ConfigStore` with validated, atomic edits
//!
//! ```no_run
//! use o2trim_config::JsonConfigStore;
//! use o2trim_core::ConfigStore;
//!
//! let store = JsonConfigStore::open("settings.json")?;
//! println!("setpoint {}", store.get_pid_config().o2_setpoint);
//! # Ok::<(), o2trim_config::ConfigError>(())
//! ```

pub mod document;
pub mod error;
pub mod store;
pub mod validation;

pub use document::{ChannelSection, PidSection, SettingsDocument, TablePoint};
pub use error::{ConfigError, ConfigResult};
pub use store::JsonConfigStore;
pub use validation::{validate, IssueType, Severity, Validated, ValidationIssue, ValidationReport};

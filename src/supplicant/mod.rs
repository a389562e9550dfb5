//! Driving the external WPA supplicant.
//!
//! - [`ctrl`]: command/event exchange over the control socket
//! - [`event`]: classification of unsolicited event lines
//! - [`scan`]: `SCAN_RESULTS` parsing
//! - [`config_file`]: authenticate and connect configuration files

pub mod config_file;
pub mod ctrl;
mod error;
pub mod event;
pub mod scan;

pub use ctrl::{ControlChannel, ControlConnector, UnixConnector, UnixControlChannel};
pub use error::CtrlError;
pub use event::SupplicantEvent;
pub use scan::ScanRecord;

pub mod error;

pub use error::{PulseError, Result, ResultExt, SessionErrorKind, log_filter_error};

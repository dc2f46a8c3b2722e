//! Thread-safe asynchronous logging library.
//!
//! Every layer of the transport obtains a scoped [`Logger`] from a shared
//! [`LoggerFactory`]; all loggers of a factory feed the same writer thread.

pub mod error;
mod factory;
mod log_level;
mod log_message;
mod log_writer;
mod logger;

pub use error::{LoggingError, Result};
pub use factory::{LEVEL_ENV, LoggerFactory, SCOPES_ENV};
pub use log_level::LogLevel;
pub use log_writer::LogTarget;
pub use logger::Logger;

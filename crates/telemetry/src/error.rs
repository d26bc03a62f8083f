use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
	#[error("Invalid log level: '{0}', expected one of trace, debug, info, warn, error")]
	InvalidLogLevel(String),

	#[error("Failed to initialize logger: {0}")]
	InitFailed(String),
}

use std::time::Duration;

use thiserror::Error;

/// Errors raised while accepting clients or setting up a connection pair.
///
/// Failures inside a running pair are not errors of this kind: they end the
/// pair and are logged where they happen.
#[derive(Error, Debug)]
pub enum ProxyError {
	#[error("Failed to bind '{addr}': {source}")]
	Bind {
		addr: String,
		source: std::io::Error,
	},

	#[error("Failed to connect to backend '{addr}': {source}")]
	Connect {
		addr: String,
		source: std::io::Error,
	},

	#[error("Timed out connecting to backend '{addr}' after {timeout:?}")]
	ConnectTimeout { addr: String, timeout: Duration },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

//! Error types for RESP parsing and encoding.

use thiserror::Error;

/// Main error type for RESP operations.
///
/// Every variant is fatal to the read or write call that produced it; the
/// stream the value came from should be treated as unusable.
#[derive(Error, Debug)]
pub enum RespError {
	/// Error during parsing
	#[error("Parse error: {0}")]
	Parse(#[from] ParseError),

	/// Error during encoding
	#[error("Encode error: {0}")]
	Encode(#[from] EncodeError),

	/// The underlying stream failed
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl RespError {
	/// True when the peer went away in the middle of a value.
	pub fn is_unexpected_eof(&self) -> bool {
		matches!(self, RespError::Parse(ParseError::UnexpectedEOF))
	}
}

/// Errors that can occur during RESP parsing (framing errors).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
	/// Unexpected end of input while parsing
	#[error("Unexpected end of input")]
	UnexpectedEOF,

	/// Invalid type marker encountered
	#[error("Invalid type marker: {0:?}")]
	InvalidTypeMarker(char),

	/// Invalid format for the current type
	#[error("Invalid format: {0}")]
	InvalidFormat(String),

	/// Invalid integer value
	#[error("Invalid integer: {0}")]
	InvalidInteger(String),

	/// Invalid bulk string length
	#[error("Invalid bulk string length: {0}")]
	InvalidBulkStringLength(i64),

	/// Invalid array length
	#[error("Invalid array length: {0}")]
	InvalidArrayLength(i64),

	/// A peer-supplied length is larger than the configured maximum
	#[error("{what} of {len} exceeds maximum of {max}")]
	LimitExceeded {
		what: &'static str,
		len: usize,
		max: usize,
	},

	/// A command without a name
	#[error("Empty command name")]
	EmptyCommand,
}

impl From<std::str::Utf8Error> for ParseError {
	fn from(e: std::str::Utf8Error) -> Self {
		ParseError::InvalidInteger(e.to_string())
	}
}

impl From<std::num::ParseIntError> for ParseError {
	fn from(e: std::num::ParseIntError) -> Self {
		ParseError::InvalidInteger(e.to_string())
	}
}

/// Errors that can occur during RESP encoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
	/// Reply tag byte outside `+ - : $ *`
	#[error("Unknown reply code: {0:?}")]
	UnknownReplyCode(char),

	/// Invalid value for encoding
	#[error("Invalid value: {0}")]
	InvalidValue(String),
}

//! Utility functions and constants for RESP protocol.

use crate::error::ParseError;

/// CRLF line ending
pub const CRLF: &[u8] = b"\r\n";

/// Type markers
pub const SIMPLE_STRING: u8 = b'+';
pub const ERROR: u8 = b'-';
pub const INTEGER: u8 = b':';
pub const BULK_STRING: u8 = b'$';
pub const ARRAY: u8 = b'*';

/// Length line that marks an absent bulk value
pub const NIL_LENGTH: &[u8] = b"-1";

/// Find the position of the LF that ends the first line
#[inline]
pub fn find_lf(buf: &[u8]) -> Option<usize> {
	memchr::memchr(b'\n', buf)
}

/// Peek a line from buffer without consuming it.
///
/// Returns the line with trailing CR/LF bytes stripped and the number of
/// bytes the line occupies including its LF.
#[inline]
pub fn peek_line(buf: &[u8]) -> Option<(&[u8], usize)> {
	find_lf(buf).map(|pos| (trim_line(&buf[..pos]), pos + 1))
}

/// Strip any trailing CR and LF bytes
#[inline]
pub fn trim_line(mut line: &[u8]) -> &[u8] {
	while let [rest @ .., b'\r' | b'\n'] = line {
		line = rest;
	}
	line
}

/// Parse an integer from a byte slice
#[inline]
pub fn parse_integer(buf: &[u8]) -> Result<i64, ParseError> {
	let s = std::str::from_utf8(buf)?;
	s.parse::<i64>()
		.map_err(|e| ParseError::InvalidInteger(format!("{:?}: {}", s, e)))
}

//! Streaming RESP parser for proxy traffic.
//!
//! The parser works on a `BytesMut` the caller fills from the socket. A call
//! either yields one complete value and consumes exactly its bytes, reports
//! that more input is needed, or fails with a framing error.

use std::sync::Arc;

use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;

use crate::error::ParseError;
use crate::limits::ParserLimits;
use crate::table::CommandTable;
use crate::types::Command;
use crate::types::Reply;
use crate::utils::*;

/// Upper bound on elements preallocated from a declared multi-bulk count.
const MAX_PREALLOC: usize = 1024;

/// Result of a parsing attempt.
#[derive(Debug)]
pub enum RespParseResult<T> {
	/// A complete value was parsed.
	Complete(T),
	/// The buffer does not contain enough data to parse a complete value.
	Incomplete,
	/// An error occurred during parsing.
	Error(ParseError),
}

/// A stateful RESP parser that supports streaming.
///
/// One parser serves one direction of one connection: it only remembers the
/// elements of a multi-bulk value that has not fully arrived yet.
pub struct RespParser {
	limits: ParserLimits,
	table: Arc<CommandTable>,
	frame: Option<Frame>,
}

/// A multi-bulk value whose header has been consumed.
#[derive(Debug)]
struct Frame {
	expected: usize,
	elements: Vec<Option<Bytes>>,
}

// Helper enum for inline parsing
enum Inline {
	Command(Command),
	Blank,
}

impl Default for RespParser {
	fn default() -> Self {
		Self::new()
	}
}

impl RespParser {
	pub fn new() -> Self {
		Self {
			limits: ParserLimits::default(),
			table: CommandTable::legacy(),
			frame: None,
		}
	}

	pub fn with_limits(mut self, limits: ParserLimits) -> Self {
		self.limits = limits;
		self
	}

	pub fn with_table(mut self, table: Arc<CommandTable>) -> Self {
		self.table = table;
		self
	}

	pub fn limits(&self) -> &ParserLimits {
		&self.limits
	}

	/// Whether part of a multi-bulk value has been consumed already.
	pub fn in_progress(&self) -> bool {
		self.frame.is_some()
	}

	/// Parse a client command from the buffer.
	///
	/// `*` starts a multi-bulk command; any other byte starts an inline one.
	pub fn parse_command(&mut self, buf: &mut BytesMut) -> RespParseResult<Command> {
		let result = self.try_command(buf);
		self.finish(result)
	}

	/// Parse a backend reply from the buffer.
	pub fn parse_reply(&mut self, buf: &mut BytesMut) -> RespParseResult<Reply> {
		let result = self.try_reply(buf);
		self.finish(result)
	}

	fn finish<T>(&mut self, result: Result<Option<T>, ParseError>) -> RespParseResult<T> {
		match result {
			Ok(Some(value)) => RespParseResult::Complete(value),
			Ok(None) => RespParseResult::Incomplete,
			Err(e) => {
				self.frame = None;
				RespParseResult::Error(e)
			}
		}
	}

	fn try_command(&mut self, buf: &mut BytesMut) -> Result<Option<Command>, ParseError> {
		loop {
			if self.frame.is_some() {
				return self.parse_multibulk(buf)?.map(command_from_values).transpose();
			}

			// Peek type marker
			let Some(&marker) = buf.first() else {
				return Ok(None);
			};

			if marker == ARRAY {
				return self.parse_multibulk(buf)?.map(command_from_values).transpose();
			}

			match self.parse_inline(buf)? {
				Some(Inline::Command(cmd)) => return Ok(Some(cmd)),
				// Redis ignores empty lines between commands
				Some(Inline::Blank) => continue,
				None => return Ok(None),
			}
		}
	}

	fn try_reply(&mut self, buf: &mut BytesMut) -> Result<Option<Reply>, ParseError> {
		if self.frame.is_some() {
			return Ok(self.parse_multibulk(buf)?.map(Reply::MultiBulk));
		}

		let Some(&marker) = buf.first() else {
			return Ok(None);
		};

		match marker {
			SIMPLE_STRING => Ok(self.parse_scalar(buf)?.map(Reply::Status)),
			ERROR => Ok(self.parse_scalar(buf)?.map(Reply::Error)),
			INTEGER => Ok(self.parse_scalar(buf)?.map(Reply::Integer)),
			BULK_STRING => Ok(parse_bulk(buf, &self.limits)?.map(Reply::Bulk)),
			ARRAY => Ok(self.parse_multibulk(buf)?.map(Reply::MultiBulk)),
			other => Err(ParseError::InvalidTypeMarker(other as char)),
		}
	}

	/// `+`, `-` and `:` lines: the payload is everything after the tag.
	fn parse_scalar(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, ParseError> {
		match peek_limited_line(&buf[1..], &self.limits)? {
			Some((line, total_len)) => {
				let value = Bytes::copy_from_slice(line);
				buf.advance(1 + total_len);
				Ok(Some(value))
			}
			None => Ok(None),
		}
	}

	/// `*<count>` followed by `count` bulk strings.
	///
	/// The header is consumed as soon as it is complete; elements are kept
	/// in the pending frame until the last one arrives.
	fn parse_multibulk(
		&mut self,
		buf: &mut BytesMut,
	) -> Result<Option<Vec<Option<Bytes>>>, ParseError> {
		if self.frame.is_none() {
			let Some((line, total_len)) = peek_limited_line(&buf[1..], &self.limits)? else {
				return Ok(None);
			};
			let count = parse_integer(line)?;
			if count < 1 {
				return Err(ParseError::InvalidArrayLength(count));
			}
			let count =
				usize::try_from(count).map_err(|_| ParseError::InvalidArrayLength(count))?;
			if count > self.limits.max_multibulk_len {
				return Err(ParseError::LimitExceeded {
					what: "multi-bulk count",
					len: count,
					max: self.limits.max_multibulk_len,
				});
			}
			buf.advance(1 + total_len);
			self.frame = Some(Frame {
				expected: count,
				elements: Vec::with_capacity(count.min(MAX_PREALLOC)),
			});
		}

		let limits = self.limits;
		if let Some(frame) = self.frame.as_mut() {
			while frame.elements.len() < frame.expected {
				match buf.first() {
					None => return Ok(None),
					Some(&BULK_STRING) => {}
					Some(&other) => {
						return Err(ParseError::InvalidFormat(format!(
							"Expected '$' in multi-bulk, found {:?}",
							other as char
						)));
					}
				}
				match parse_bulk(buf, &limits)? {
					Some(value) => frame.elements.push(value),
					None => return Ok(None),
				}
			}
		}

		Ok(self.frame.take().map(|frame| frame.elements))
	}

	fn parse_inline(&self, buf: &mut BytesMut) -> Result<Option<Inline>, ParseError> {
		let Some((line, total_len)) = peek_limited_line(&buf[..], &self.limits)? else {
			return Ok(None);
		};

		if line.is_empty() {
			buf.advance(total_len);
			return Ok(Some(Inline::Blank));
		}

		// Format: "CMD arg1 arg2 ...\r\n", split on single spaces.
		let mut tokens = line.split(|&b| b == b' ');
		let name = tokens
			.next()
			.filter(|name| !name.is_empty())
			.ok_or(ParseError::EmptyCommand)?
			.to_ascii_lowercase();
		let mut args: Vec<Bytes> = tokens.map(Bytes::copy_from_slice).collect();

		if !self.table.is_bulk(&name) {
			buf.advance(total_len);
			return Ok(Some(Inline::Command(Command::new(name, args)?)));
		}

		// Legacy bulk-style command: the last token is the byte count of the
		// real last argument, which follows the line.
		let Some(length) = args.last() else {
			return Err(ParseError::InvalidFormat(format!(
				"Inline '{}' is missing its bulk length",
				name.escape_ascii()
			)));
		};
		let length = bulk_length(parse_integer(length)?, &self.limits)?;

		let total_needed = total_len + length + 2;
		if buf.len() < total_needed {
			buf.reserve(total_needed - buf.len());
			return Ok(None);
		}
		if &buf[total_len + length..total_needed] != CRLF {
			return Err(ParseError::InvalidFormat(
				"Missing CRLF after inline bulk argument".to_string(),
			));
		}

		buf.advance(total_len);
		let payload = buf.split_to(length).freeze();
		buf.advance(2);
		if let Some(last) = args.last_mut() {
			*last = payload;
		}

		Ok(Some(Inline::Command(Command::new(name, args)?)))
	}
}

/// Peek a line, failing once it grows past the configured maximum.
fn peek_limited_line<'a>(
	buf: &'a [u8],
	limits: &ParserLimits,
) -> Result<Option<(&'a [u8], usize)>, ParseError> {
	match peek_line(buf) {
		Some((line, _)) if line.len() > limits.max_inline_len => Err(ParseError::LimitExceeded {
			what: "line length",
			len: line.len(),
			max: limits.max_inline_len,
		}),
		Some(found) => Ok(Some(found)),
		None if buf.len() > limits.max_inline_len => Err(ParseError::LimitExceeded {
			what: "line length",
			len: buf.len(),
			max: limits.max_inline_len,
		}),
		None => Ok(None),
	}
}

/// Validate a declared bulk payload length.
fn bulk_length(length: i64, limits: &ParserLimits) -> Result<usize, ParseError> {
	if length < 0 {
		return Err(ParseError::InvalidBulkStringLength(length));
	}
	let length =
		usize::try_from(length).map_err(|_| ParseError::InvalidBulkStringLength(length))?;
	if length > limits.max_bulk_len {
		return Err(ParseError::LimitExceeded {
			what: "bulk length",
			len: length,
			max: limits.max_bulk_len,
		});
	}
	Ok(length)
}

/// `$<len>\r\n<payload>\r\n`, or `$-1\r\n` for the absent value.
///
/// `buf[0]` must be `$`. Returns `Ok(None)` when incomplete,
/// `Ok(Some(None))` for the absent value.
fn parse_bulk(
	buf: &mut BytesMut,
	limits: &ParserLimits,
) -> Result<Option<Option<Bytes>>, ParseError> {
	// $6\r\nfoobar\r\n
	let Some((line, len_consumed)) = peek_limited_line(&buf[1..], limits)? else {
		return Ok(None);
	};

	let length = parse_integer(line)?;
	if length == -1 {
		buf.advance(1 + len_consumed);
		return Ok(Some(None));
	}
	let length = bulk_length(length, limits)?;

	let total_needed = 1 + len_consumed + length + 2; // +2 for CRLF
	if buf.len() < total_needed {
		buf.reserve(total_needed - buf.len());
		return Ok(None);
	}

	// All good, consume
	buf.advance(1 + len_consumed);
	let data = buf.split_to(length).freeze();
	if &buf[..2] != CRLF {
		return Err(ParseError::InvalidFormat(
			"Missing CRLF after bulk string".to_string(),
		));
	}
	buf.advance(2);

	Ok(Some(Some(data)))
}

fn command_from_values(values: Vec<Option<Bytes>>) -> Result<Command, ParseError> {
	let mut values = values.into_iter().map(|value| {
		value.ok_or_else(|| ParseError::InvalidFormat("Null bulk string in command".to_string()))
	});
	let name = values.next().ok_or(ParseError::EmptyCommand)??;
	Command::new(name, values.collect::<Result<Vec<_>, _>>()?)
}

/// Convenience function for one-off command parsing.
///
/// Missing input is reported as [`ParseError::UnexpectedEOF`]. If streaming
/// is needed, use `RespParser` directly.
pub fn parse_command(buf: &mut BytesMut) -> Result<Command, ParseError> {
	match RespParser::new().parse_command(buf) {
		RespParseResult::Complete(cmd) => Ok(cmd),
		RespParseResult::Incomplete => Err(ParseError::UnexpectedEOF),
		RespParseResult::Error(e) => Err(e),
	}
}

/// Convenience function for one-off reply parsing.
pub fn parse_reply(buf: &mut BytesMut) -> Result<Reply, ParseError> {
	match RespParser::new().parse_reply(buf) {
		RespParseResult::Complete(reply) => Ok(reply),
		RespParseResult::Incomplete => Err(ParseError::UnexpectedEOF),
		RespParseResult::Error(e) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn args(values: &[&str]) -> Vec<Bytes> {
		values
			.iter()
			.map(|v| Bytes::copy_from_slice(v.as_bytes()))
			.collect()
	}

	#[test]
	fn test_parse_multibulk_command() {
		let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n"[..]);
		let cmd = parse_command(&mut buf).unwrap();
		assert_eq!(cmd.name(), "get");
		assert_eq!(cmd.args(), args(&["foo"]).as_slice());
		assert!(buf.is_empty());
	}

	#[test]
	fn test_parse_multibulk_binary_args() {
		let mut buf = BytesMut::from(&b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$4\r\n\x00\r\n\xff\r\n"[..]);
		let cmd = parse_command(&mut buf).unwrap();
		assert_eq!(cmd.args()[1], Bytes::from_static(b"\x00\r\n\xff"));
	}

	#[rstest]
	#[case(b"PING\r\n", "ping", vec![])]
	#[case(b"GET foo\r\n", "get", vec!["foo"])]
	#[case(b"Get Foo\n", "get", vec!["Foo"])]
	#[case(b"\r\nPING\r\n", "ping", vec![])] // Empty line skipped
	#[case(b"DEL a  b\r\n", "del", vec!["a", "", "b"])] // Single-space split
	#[case(b"GET \"val with spaces\"\r\n", "get", vec!["\"val", "with", "spaces\""])] // Quotes not handled
	fn test_parse_inline_command(
		#[case] input: &[u8],
		#[case] name: &str,
		#[case] expected: Vec<&str>,
	) {
		let mut buf = BytesMut::from(input);
		let cmd = parse_command(&mut buf).unwrap();
		assert_eq!(cmd.name(), name);
		assert_eq!(cmd.args(), args(&expected).as_slice());
		assert!(buf.is_empty());
	}

	#[test]
	fn test_parse_inline_consumes_only_its_line() {
		let mut buf = BytesMut::from(&b"GET foo\r\n*1\r\n$4\r\nPING\r\n"[..]);
		let cmd = parse_command(&mut buf).unwrap();
		assert_eq!(cmd.name(), "get");
		assert_eq!(&buf[..], b"*1\r\n$4\r\nPING\r\n");
	}

	#[test]
	fn test_parse_inline_bulk_command() {
		let mut buf = BytesMut::from(&b"set foo 6\r\nb a\r\nr\r\nGET foo\r\n"[..]);
		let cmd = parse_command(&mut buf).unwrap();
		assert_eq!(cmd.name(), "set");
		assert_eq!(cmd.args(), args(&["foo", "b a\r\nr"]).as_slice());
		assert_eq!(&buf[..], b"GET foo\r\n");
	}

	#[test]
	fn test_parse_inline_bulk_command_incomplete() {
		let mut parser = RespParser::new();
		let mut buf = BytesMut::from(&b"SET foo 3\r\nba"[..]);
		assert!(matches!(
			parser.parse_command(&mut buf),
			RespParseResult::Incomplete
		));
		assert_eq!(&buf[..], b"SET foo 3\r\nba");

		buf.extend_from_slice(b"r\r\n");
		match parser.parse_command(&mut buf) {
			RespParseResult::Complete(cmd) => {
				assert_eq!(cmd.args(), args(&["foo", "bar"]).as_slice());
			}
			other => panic!("Expected Complete, got {:?}", other),
		}
		assert!(buf.is_empty());
	}

	#[rstest]
	#[case(b"set\r\n")] // No bulk length at all
	#[case(b"set foo bar\r\n")] // Length not numeric
	#[case(b"set foo -3\r\n")]
	#[case(b"set foo 3\r\nbarXY")] // Bad terminator
	fn test_parse_inline_bulk_command_invalid(#[case] input: &[u8]) {
		let mut buf = BytesMut::from(input);
		assert!(parse_command(&mut buf).is_err());
	}

	#[test]
	fn test_parse_inline_with_custom_table() {
		let table = Arc::new(CommandTable::with_extra(["stash"]));
		let mut parser = RespParser::new().with_table(table);
		let mut buf = BytesMut::from(&b"STASH k 2\r\nhi\r\n"[..]);
		match parser.parse_command(&mut buf) {
			RespParseResult::Complete(cmd) => {
				assert_eq!(cmd.name(), "stash");
				assert_eq!(cmd.args(), args(&["k", "hi"]).as_slice());
			}
			other => panic!("Expected Complete, got {:?}", other),
		}
	}

	#[rstest]
	#[case(b" GET foo\r\n", ParseError::EmptyCommand)]
	#[case(b"*0\r\n", ParseError::InvalidArrayLength(0))]
	#[case(b"*-1\r\n", ParseError::InvalidArrayLength(-1))]
	#[case(b"*1\r\n$0\r\n\r\n", ParseError::EmptyCommand)]
	#[case(b"*1\r\n$-2\r\n", ParseError::InvalidBulkStringLength(-2))]
	fn test_parse_command_framing_errors(#[case] input: &[u8], #[case] expected: ParseError) {
		let mut buf = BytesMut::from(input);
		assert_eq!(parse_command(&mut buf), Err(expected));
	}

	#[rstest]
	#[case(b"*x\r\n")]
	#[case(b"*2\r\n$3\r\nGET\r\n:1\r\n")] // Non-bulk element
	#[case(b"*2\r\n$3\r\nGET\r\n$-1\r\n")] // Null argument
	#[case(b"*1\r\n$3\r\nGETXY")] // Missing CRLF after payload
	fn test_parse_command_invalid(#[case] input: &[u8]) {
		let mut buf = BytesMut::from(input);
		assert!(parse_command(&mut buf).is_err());
	}

	#[rstest]
	#[case(b"+OK\r\n", Reply::status("OK"))]
	#[case(b"-ERR no such key\r\n", Reply::error("ERR no such key"))]
	#[case(b":1000\r\n", Reply::Integer(Bytes::from("1000")))]
	#[case(b":-7\r\n", Reply::Integer(Bytes::from("-7")))]
	#[case(b"$6\r\nfoobar\r\n", Reply::bulk("foobar"))]
	#[case(b"$0\r\n\r\n", Reply::bulk(""))]
	#[case(b"$-1\r\n", Reply::nil())]
	#[case(b"*2\r\n$3\r\nfoo\r\n$-1\r\n", Reply::MultiBulk(vec![Some(Bytes::from("foo")), None]))]
	fn test_parse_reply(#[case] input: &[u8], #[case] expected: Reply) {
		let mut buf = BytesMut::from(input);
		assert_eq!(parse_reply(&mut buf).unwrap(), expected);
		assert!(buf.is_empty());
	}

	#[test]
	fn test_parse_reply_nil_consumes_only_header() {
		let mut buf = BytesMut::from(&b"$-1\r\n+OK\r\n"[..]);
		assert_eq!(parse_reply(&mut buf).unwrap(), Reply::nil());
		assert_eq!(&buf[..], b"+OK\r\n");
	}

	#[test]
	fn test_parse_reply_empty_vs_absent() {
		let mut buf = BytesMut::from(&b"$0\r\n\r\n"[..]);
		let reply = parse_reply(&mut buf).unwrap();
		assert_eq!(reply.values(), vec![Some(&Bytes::new())]);
		assert_ne!(reply, Reply::nil());
	}

	#[rstest]
	#[case(b"PONG\r\n", ParseError::InvalidTypeMarker('P'))]
	#[case(b"_\r\n", ParseError::InvalidTypeMarker('_'))]
	#[case(b"*0\r\n", ParseError::InvalidArrayLength(0))]
	#[case(b"*-1\r\n", ParseError::InvalidArrayLength(-1))]
	fn test_parse_reply_framing_errors(#[case] input: &[u8], #[case] expected: ParseError) {
		let mut buf = BytesMut::from(input);
		assert_eq!(parse_reply(&mut buf), Err(expected));
	}

	#[test]
	fn test_parse_reply_incomplete_is_eof() {
		let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);
		assert_eq!(parse_reply(&mut buf), Err(ParseError::UnexpectedEOF));
	}

	#[test]
	fn test_limits_bulk_len() {
		let limits = ParserLimits {
			max_bulk_len: 4,
			..ParserLimits::default()
		};
		let mut parser = RespParser::new().with_limits(limits);
		let mut buf = BytesMut::from(&b"$5\r\n"[..]);
		assert!(matches!(
			parser.parse_reply(&mut buf),
			RespParseResult::Error(ParseError::LimitExceeded { len: 5, max: 4, .. })
		));
	}

	#[test]
	fn test_limits_multibulk_len() {
		let limits = ParserLimits {
			max_multibulk_len: 2,
			..ParserLimits::default()
		};
		let mut parser = RespParser::new().with_limits(limits);
		let mut buf = BytesMut::from(&b"*3\r\n"[..]);
		assert!(matches!(
			parser.parse_command(&mut buf),
			RespParseResult::Error(ParseError::LimitExceeded { len: 3, max: 2, .. })
		));
	}

	#[test]
	fn test_limits_inline_len() {
		let limits = ParserLimits {
			max_inline_len: 8,
			..ParserLimits::default()
		};
		let mut parser = RespParser::new().with_limits(limits);

		// Unterminated line already past the limit
		let mut buf = BytesMut::from(&b"GET aaaaaaaaaa"[..]);
		assert!(matches!(
			parser.parse_command(&mut buf),
			RespParseResult::Error(ParseError::LimitExceeded { .. })
		));

		let mut buf = BytesMut::from(&b"GET aaaaaaaaaa\r\n"[..]);
		assert!(matches!(
			parser.parse_command(&mut buf),
			RespParseResult::Error(ParseError::LimitExceeded { .. })
		));
	}

	#[test]
	fn test_parser_resets_after_error() {
		let mut parser = RespParser::new();
		let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n:1\r\n"[..]);
		assert!(matches!(
			parser.parse_reply(&mut buf),
			RespParseResult::Error(_)
		));

		let mut buf = BytesMut::from(&b"+OK\r\n"[..]);
		assert!(matches!(
			parser.parse_reply(&mut buf),
			RespParseResult::Complete(Reply::Status(_))
		));
	}
}

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;

use crate::error::ParseError;
use crate::error::RespError;
use crate::limits::ParserLimits;
use crate::parser::RespParseResult;
use crate::parser::RespParser;
use crate::table::CommandTable;
use crate::types::Command;
use crate::types::Reply;

const READ_BUFFER_SIZE: usize = 4096;

/// Reads RESP values from a byte stream, one value per call.
///
/// Each call waits until a complete value has arrived. `Ok(None)` means the
/// stream ended cleanly between values; end of stream inside a value is
/// [`ParseError::UnexpectedEOF`].
pub struct RespReader<R> {
	inner: R,
	buffer: BytesMut,
	parser: RespParser,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
	pub fn new(inner: R) -> Self {
		Self::with_parser(inner, RespParser::new())
	}

	pub fn with_parser(inner: R, parser: RespParser) -> Self {
		Self {
			inner,
			buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
			parser,
		}
	}

	/// Reader with custom limits and inline command table.
	pub fn with_config(inner: R, limits: ParserLimits, table: Arc<CommandTable>) -> Self {
		Self::with_parser(inner, RespParser::new().with_limits(limits).with_table(table))
	}

	pub async fn read_command(&mut self) -> Result<Option<Command>, RespError> {
		loop {
			match self.parser.parse_command(&mut self.buffer) {
				RespParseResult::Complete(cmd) => return Ok(Some(cmd)),
				RespParseResult::Incomplete => {}
				RespParseResult::Error(e) => return Err(e.into()),
			}
			if !self.fill_buffer().await? {
				return Ok(None);
			}
		}
	}

	pub async fn read_reply(&mut self) -> Result<Option<Reply>, RespError> {
		loop {
			match self.parser.parse_reply(&mut self.buffer) {
				RespParseResult::Complete(reply) => return Ok(Some(reply)),
				RespParseResult::Incomplete => {}
				RespParseResult::Error(e) => return Err(e.into()),
			}
			if !self.fill_buffer().await? {
				return Ok(None);
			}
		}
	}

	/// Read more bytes into the buffer.
	///
	/// Returns false on a clean end of stream, i.e. nothing of a next value
	/// has been received yet.
	async fn fill_buffer(&mut self) -> Result<bool, RespError> {
		if self.buffer.capacity() == self.buffer.len() {
			self.buffer.reserve(READ_BUFFER_SIZE);
		}
		let n = self.inner.read_buf(&mut self.buffer).await?;
		if n > 0 {
			return Ok(true);
		}
		if self.buffer.is_empty() && !self.parser.in_progress() {
			Ok(false)
		} else {
			Err(ParseError::UnexpectedEOF.into())
		}
	}

	/// Bytes received but not yet parsed.
	pub fn buffered(&self) -> &[u8] {
		&self.buffer
	}

	pub fn get_ref(&self) -> &R {
		&self.inner
	}

	pub fn into_inner(self) -> R {
		self.inner
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;

	#[tokio::test]
	async fn test_read_commands_until_eof() {
		let input: &[u8] = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\nPING\r\n";
		let mut reader = RespReader::new(input);

		let cmd = reader.read_command().await.unwrap().unwrap();
		assert_eq!(cmd.name(), "get");
		assert_eq!(cmd.args(), &[Bytes::from("foo")]);

		let cmd = reader.read_command().await.unwrap().unwrap();
		assert_eq!(cmd.name(), "ping");

		assert!(reader.read_command().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_read_reply_eof_mid_value() {
		let input: &[u8] = b"+OK\r\n$10\r\nhello";
		let mut reader = RespReader::new(input);

		assert_eq!(
			reader.read_reply().await.unwrap(),
			Some(Reply::status("OK"))
		);
		let err = reader.read_reply().await.unwrap_err();
		assert!(err.is_unexpected_eof(), "got {:?}", err);
	}

	#[tokio::test]
	async fn test_read_reply_eof_inside_multibulk() {
		// Header and first element consumed, second never arrives
		let input: &[u8] = b"*2\r\n$3\r\nfoo\r\n";
		let mut reader = RespReader::new(input);
		let err = reader.read_reply().await.unwrap_err();
		assert!(err.is_unexpected_eof(), "got {:?}", err);
	}

	#[tokio::test]
	async fn test_read_reply_framing_error() {
		let input: &[u8] = b"?what\r\n";
		let mut reader = RespReader::new(input);
		let err = reader.read_reply().await.unwrap_err();
		assert!(matches!(
			err,
			RespError::Parse(ParseError::InvalidTypeMarker('?'))
		));
	}
}

use bytes::BytesMut;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufWriter;

use crate::encode::RespEncoder;
use crate::error::RespError;
use crate::types::Command;
use crate::types::Reply;

/// Buffered RESP writer.
///
/// Writes are buffered until [`RespWriter::flush`] is called, so a caller
/// decides when bytes actually reach the peer.
pub struct RespWriter<W: AsyncWrite + Unpin> {
	inner: BufWriter<W>,
	scratch: BytesMut,
}

impl<W: AsyncWrite + Unpin> RespWriter<W> {
	pub fn new(inner: W) -> Self {
		Self {
			inner: BufWriter::new(inner),
			scratch: BytesMut::with_capacity(1024),
		}
	}

	/// Write a command in multi-bulk form.
	pub async fn write_command(&mut self, cmd: &Command) -> Result<(), RespError> {
		self.write_value(cmd).await
	}

	pub async fn write_reply(&mut self, reply: &Reply) -> Result<(), RespError> {
		self.write_value(reply).await
	}

	async fn write_value<T: RespEncoder>(&mut self, value: &T) -> Result<(), RespError> {
		self.scratch.clear();
		value.encode_to(&mut self.scratch)?;
		self.inner.write_all(&self.scratch).await?;
		Ok(())
	}

	pub async fn flush(&mut self) -> Result<(), RespError> {
		self.inner.flush().await?;
		Ok(())
	}

	/// Flush and shut down the write half.
	pub async fn shutdown(&mut self) -> Result<(), RespError> {
		self.inner.shutdown().await?;
		Ok(())
	}

	pub fn get_ref(&self) -> &W {
		self.inner.get_ref()
	}

	pub fn into_inner(self) -> W {
		self.inner.into_inner()
	}
}

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use crate::error::EncodeError;
use crate::types::Command;
use crate::types::Reply;
use crate::utils::*;

/// Trait for encoding RESP values.
pub trait RespEncoder {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;

	fn encode(&self) -> Result<Bytes, EncodeError> {
		let mut buf = BytesMut::new();
		self.encode_to(&mut buf)?;
		Ok(buf.freeze())
	}
}

/// Commands always go out as multi-bulk, whatever framing they came in with.
impl RespEncoder for Command {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
		encode_length(buf, ARRAY, self.len());
		encode_bulk_string(buf, Some(self.name()));
		for arg in self.args() {
			encode_bulk_string(buf, Some(arg));
		}
		Ok(())
	}
}

impl RespEncoder for Reply {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
		match self {
			Reply::Status(s) => encode_line(buf, SIMPLE_STRING, s),
			Reply::Error(e) => encode_line(buf, ERROR, e),
			Reply::Integer(i) => encode_line(buf, INTEGER, i),
			Reply::Bulk(s) => encode_bulk_string(buf, s.as_ref()),
			Reply::MultiBulk(values) => encode_multibulk(buf, values),
		}
		Ok(())
	}
}

/// Tag, raw payload, CRLF. No length prefix.
#[inline]
fn encode_line(buf: &mut BytesMut, marker: u8, payload: &[u8]) {
	buf.reserve(payload.len() + 3);
	buf.put_u8(marker);
	buf.put_slice(payload);
	buf.put_slice(CRLF);
}

#[inline]
fn encode_length(buf: &mut BytesMut, marker: u8, length: usize) {
	buf.put_u8(marker);
	buf.put_slice(length.to_string().as_bytes());
	buf.put_slice(CRLF);
}

#[inline]
fn encode_bulk_string(buf: &mut BytesMut, s: Option<&Bytes>) {
	match s {
		Some(s) => {
			encode_length(buf, BULK_STRING, s.len());
			buf.reserve(s.len() + 2);
			buf.put_slice(s);
			buf.put_slice(CRLF);
		}
		None => {
			buf.put_u8(BULK_STRING);
			buf.put_slice(NIL_LENGTH);
			buf.put_slice(CRLF);
		}
	}
}

fn encode_multibulk(buf: &mut BytesMut, values: &[Option<Bytes>]) {
	encode_length(buf, ARRAY, values.len());
	for value in values {
		encode_bulk_string(buf, value.as_ref());
	}
}

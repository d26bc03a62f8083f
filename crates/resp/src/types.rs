//! Command and reply values carried across the proxy.

use std::fmt;

use bytes::Bytes;

use crate::error::EncodeError;
use crate::error::ParseError;
use crate::utils::ARRAY;
use crate::utils::BULK_STRING;
use crate::utils::ERROR;
use crate::utils::INTEGER;
use crate::utils::SIMPLE_STRING;

/// A client request: a lowercased name followed by binary-safe arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
	name: Bytes,
	args: Vec<Bytes>,
}

impl Command {
	/// Build a command, lowercasing the name.
	///
	/// Fails with [`ParseError::EmptyCommand`] if the name is empty.
	pub fn new(name: impl Into<Bytes>, args: Vec<Bytes>) -> Result<Self, ParseError> {
		let name = name.into();
		if name.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		let name = if name.iter().any(u8::is_ascii_uppercase) {
			Bytes::from(name.to_ascii_lowercase())
		} else {
			name
		};
		Ok(Self { name, args })
	}

	pub fn name(&self) -> &Bytes {
		&self.name
	}

	pub fn args(&self) -> &[Bytes] {
		&self.args
	}

	/// Number of values on the wire (name plus arguments)
	pub fn len(&self) -> usize {
		self.args.len() + 1
	}

	/// Always false; a command carries at least its name.
	pub fn is_empty(&self) -> bool {
		false
	}

	pub fn into_parts(self) -> (Bytes, Vec<Bytes>) {
		(self.name, self.args)
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name.escape_ascii())?;
		for arg in &self.args {
			write!(f, " {:?}", arg)?;
		}
		Ok(())
	}
}

/// The tag byte of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
	/// `+`
	Status,
	/// `-`
	Error,
	/// `:`
	Integer,
	/// `$`
	Bulk,
	/// `*`
	MultiBulk,
}

impl ReplyCode {
	pub fn as_byte(self) -> u8 {
		match self {
			ReplyCode::Status => SIMPLE_STRING,
			ReplyCode::Error => ERROR,
			ReplyCode::Integer => INTEGER,
			ReplyCode::Bulk => BULK_STRING,
			ReplyCode::MultiBulk => ARRAY,
		}
	}
}

impl TryFrom<u8> for ReplyCode {
	type Error = EncodeError;

	fn try_from(code: u8) -> Result<Self, EncodeError> {
		match code {
			SIMPLE_STRING => Ok(ReplyCode::Status),
			ERROR => Ok(ReplyCode::Error),
			INTEGER => Ok(ReplyCode::Integer),
			BULK_STRING => Ok(ReplyCode::Bulk),
			ARRAY => Ok(ReplyCode::MultiBulk),
			other => Err(EncodeError::UnknownReplyCode(other as char)),
		}
	}
}

/// A backend reply.
///
/// `None` is the absent value (`$-1`), distinct from an empty payload.
/// Array children are bulk values only; nested arrays are not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// Simple string: `+OK\r\n`
	Status(Bytes),

	/// Error: `-ERR message\r\n`. A value, not a failure.
	Error(Bytes),

	/// Integer: `:1000\r\n`, kept as raw decimal text
	Integer(Bytes),

	/// Bulk string: `$6\r\nfoobar\r\n` or `$-1\r\n`
	Bulk(Option<Bytes>),

	/// Multi-bulk: `*2\r\n$3\r\nfoo\r\n$-1\r\n`
	MultiBulk(Vec<Option<Bytes>>),
}

impl Reply {
	/// Build a reply from a raw tag byte and its values.
	///
	/// Scalar codes take exactly one present value, `$` exactly one value
	/// (present or absent), `*` any number.
	pub fn from_parts(code: u8, values: Vec<Option<Bytes>>) -> Result<Self, EncodeError> {
		let code = ReplyCode::try_from(code)?;
		match code {
			ReplyCode::MultiBulk => Ok(Reply::MultiBulk(values)),
			ReplyCode::Bulk => Ok(Reply::Bulk(single_value(code, values)?)),
			ReplyCode::Status => Ok(Reply::Status(present_value(code, values)?)),
			ReplyCode::Error => Ok(Reply::Error(present_value(code, values)?)),
			ReplyCode::Integer => Ok(Reply::Integer(present_value(code, values)?)),
		}
	}

	pub fn code(&self) -> ReplyCode {
		match self {
			Reply::Status(_) => ReplyCode::Status,
			Reply::Error(_) => ReplyCode::Error,
			Reply::Integer(_) => ReplyCode::Integer,
			Reply::Bulk(_) => ReplyCode::Bulk,
			Reply::MultiBulk(_) => ReplyCode::MultiBulk,
		}
	}

	/// The reply's values: one for scalar codes, one per child for arrays.
	pub fn values(&self) -> Vec<Option<&Bytes>> {
		match self {
			Reply::Status(v) | Reply::Error(v) | Reply::Integer(v) => vec![Some(v)],
			Reply::Bulk(v) => vec![v.as_ref()],
			Reply::MultiBulk(vs) => vs.iter().map(Option::as_ref).collect(),
		}
	}

	/// Check if the value is an error reply
	pub fn is_error(&self) -> bool {
		matches!(self, Reply::Error(_))
	}

	// Convenience constructors

	pub fn status(s: impl Into<Bytes>) -> Self {
		Reply::Status(s.into())
	}

	pub fn error(e: impl Into<Bytes>) -> Self {
		Reply::Error(e.into())
	}

	pub fn integer(i: i64) -> Self {
		Reply::Integer(Bytes::from(i.to_string()))
	}

	pub fn bulk(s: impl Into<Bytes>) -> Self {
		Reply::Bulk(Some(s.into()))
	}

	pub fn nil() -> Self {
		Reply::Bulk(None)
	}
}

fn single_value(
	code: ReplyCode,
	mut values: Vec<Option<Bytes>>,
) -> Result<Option<Bytes>, EncodeError> {
	if values.len() != 1 {
		return Err(EncodeError::InvalidValue(format!(
			"'{}' reply takes exactly one value, got {}",
			code.as_byte() as char,
			values.len()
		)));
	}
	Ok(values.pop().flatten())
}

fn present_value(code: ReplyCode, values: Vec<Option<Bytes>>) -> Result<Bytes, EncodeError> {
	single_value(code, values)?.ok_or_else(|| {
		EncodeError::InvalidValue(format!(
			"'{}' reply cannot carry an absent value",
			code.as_byte() as char
		))
	})
}

impl fmt::Display for Reply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.code().as_byte() as char)?;
		for value in self.values() {
			match value {
				Some(v) => write!(f, " {:?}", v)?,
				None => f.write_str(" (nil)")?,
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn test_command_lowercases_name() {
		let cmd = Command::new("GeT", vec![Bytes::from("Foo")]).unwrap();
		assert_eq!(cmd.name(), "get");
		// arguments are left alone
		assert_eq!(cmd.args(), &[Bytes::from("Foo")]);
		assert_eq!(cmd.len(), 2);
	}

	#[test]
	fn test_command_rejects_empty_name() {
		assert_eq!(
			Command::new(Bytes::new(), vec![]),
			Err(ParseError::EmptyCommand)
		);
	}

	#[test]
	fn test_command_display() {
		let cmd = Command::new("set", vec![Bytes::from("k"), Bytes::from("v\r\n")]).unwrap();
		assert_eq!(cmd.to_string(), r#"set b"k" b"v\r\n""#);
	}

	#[rstest]
	#[case(b'+', ReplyCode::Status)]
	#[case(b'-', ReplyCode::Error)]
	#[case(b':', ReplyCode::Integer)]
	#[case(b'$', ReplyCode::Bulk)]
	#[case(b'*', ReplyCode::MultiBulk)]
	fn test_reply_code_bytes(#[case] byte: u8, #[case] code: ReplyCode) {
		assert_eq!(ReplyCode::try_from(byte), Ok(code));
		assert_eq!(code.as_byte(), byte);
	}

	#[test]
	fn test_reply_code_unknown() {
		assert_eq!(
			ReplyCode::try_from(b'#'),
			Err(EncodeError::UnknownReplyCode('#'))
		);
	}

	#[test]
	fn test_reply_from_parts() {
		let reply = Reply::from_parts(b'+', vec![Some(Bytes::from("OK"))]).unwrap();
		assert_eq!(reply, Reply::status("OK"));
		assert_eq!(reply.code(), ReplyCode::Status);
		assert_eq!(reply.values(), vec![Some(&Bytes::from("OK"))]);

		let nil = Reply::from_parts(b'$', vec![None]).unwrap();
		assert_eq!(nil, Reply::nil());
		assert_eq!(nil.values(), vec![None]);

		let arr = Reply::from_parts(b'*', vec![Some(Bytes::from("a")), None]).unwrap();
		assert_eq!(arr.values().len(), 2);
	}

	#[test]
	fn test_reply_from_parts_rejects_bad_shapes() {
		assert_eq!(
			Reply::from_parts(b'?', vec![Some(Bytes::from("x"))]),
			Err(EncodeError::UnknownReplyCode('?'))
		);
		assert!(matches!(
			Reply::from_parts(b'+', vec![]),
			Err(EncodeError::InvalidValue(_))
		));
		assert!(matches!(
			Reply::from_parts(b':', vec![None]),
			Err(EncodeError::InvalidValue(_))
		));
	}

	#[test]
	fn test_reply_display() {
		let reply = Reply::MultiBulk(vec![Some(Bytes::from("a")), None]);
		assert_eq!(reply.to_string(), r#"* b"a" (nil)"#);
		assert_eq!(Reply::status("OK").to_string(), r#"+ b"OK""#);
		assert!(Reply::error("ERR").is_error());
		assert_eq!(Reply::integer(-3), Reply::Integer(Bytes::from("-3")));
	}
}

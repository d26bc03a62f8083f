//! # RESP - Redis Serialization Protocol codec for proxies
//!
//! Decodes the two directions of a client/server RESP conversation into
//! structured values and encodes them back to the wire.
//!
//! - Client to server traffic is a stream of [`Command`]s, framed either as a
//!   multi-bulk (`*N` followed by `N` bulk strings) or as an inline line
//!   (`GET key\r\n`), including the legacy bulk-style inline form where the
//!   last argument follows the line as a counted payload.
//! - Server to client traffic is a stream of [`Reply`]s: status, error,
//!   integer, bulk and multi-bulk.
//!
//! Commands are always re-encoded as multi-bulk, whatever framing they
//! arrived in. Replies are re-encoded in their own framing.
//!
//! ## Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use resp::RespEncoder;
//!
//! let mut buf = BytesMut::from(&b"GET foo\r\n"[..]);
//! let cmd = resp::parse_command(&mut buf).unwrap();
//! assert_eq!(cmd.name(), "get");
//! assert_eq!(&cmd.encode().unwrap()[..], b"*2\r\n$3\r\nget\r\n$3\r\nfoo\r\n");
//! ```

mod encode;
mod error;
mod limits;
mod parser;
mod reader;
mod table;
mod types;
mod utils;
mod writer;

pub use encode::RespEncoder;
pub use error::EncodeError;
pub use error::ParseError;
pub use error::RespError;
pub use limits::ParserLimits;
pub use parser::RespParseResult;
pub use parser::RespParser;
pub use parser::parse_command;
pub use parser::parse_reply;
pub use reader::RespReader;
pub use table::CommandTable;
pub use types::Command;
pub use types::Reply;
pub use types::ReplyCode;
pub use writer::RespWriter;

//! Integration tests for RESP encoder

use bytes::Bytes;
use bytes::BytesMut;
use resp::Command;
use resp::RespEncoder;
use resp::Reply;
use rstest::rstest;

fn command(parts: &[&str]) -> Command {
	let args = parts[1..]
		.iter()
		.map(|p| Bytes::copy_from_slice(p.as_bytes()))
		.collect();
	Command::new(Bytes::copy_from_slice(parts[0].as_bytes()), args).unwrap()
}

#[test]
fn test_encode_redis_ping() {
	let encoded = command(&["PING"]).encode().unwrap();
	assert_eq!(&encoded[..], b"*1\r\n$4\r\nping\r\n");
}

#[test]
fn test_encode_redis_set() {
	let encoded = command(&["SET", "key", "value"]).encode().unwrap();
	assert_eq!(
		&encoded[..],
		b"*3\r\n$3\r\nset\r\n$3\r\nkey\r\n$5\r\nvalue\r\n"
	);
}

#[rstest]
#[case::multibulk(&b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n"[..])]
#[case::inline(&b"GET foo\r\n"[..])]
#[case::inline_lf_only(&b"get foo\n"[..])]
fn test_command_reencoded_as_multibulk(#[case] input: &[u8]) {
	let mut buf = BytesMut::from(input);
	let cmd = resp::parse_command(&mut buf).unwrap();
	assert_eq!(
		&cmd.encode().unwrap()[..],
		b"*2\r\n$3\r\nget\r\n$3\r\nfoo\r\n"
	);
}

#[test]
fn test_inline_bulk_command_reencoded() {
	let mut buf = BytesMut::from(&b"SET mykey 5\r\nhello\r\n"[..]);
	let cmd = resp::parse_command(&mut buf).unwrap();
	assert_eq!(
		&cmd.encode().unwrap()[..],
		b"*3\r\n$3\r\nset\r\n$5\r\nmykey\r\n$5\r\nhello\r\n"
	);
	assert!(buf.is_empty());
}

#[rstest]
#[case(&b"+OK\r\n"[..])]
#[case(&b"-ERR unknown command 'foo'\r\n"[..])]
#[case(&b":1000\r\n"[..])]
#[case(&b":-42\r\n"[..])]
#[case(&b"$11\r\nhello world\r\n"[..])]
#[case(&b"$0\r\n\r\n"[..])]
#[case(&b"$-1\r\n"[..])]
#[case(&b"*3\r\n$1\r\na\r\n$-1\r\n$0\r\n\r\n"[..])]
fn test_reply_encodes_back_to_wire_bytes(#[case] wire: &[u8]) {
	let mut buf = BytesMut::from(wire);
	let reply = resp::parse_reply(&mut buf).unwrap();
	assert!(buf.is_empty());
	assert_eq!(&reply.encode().unwrap()[..], wire);
}

#[test]
fn test_reply_from_parts_then_encode() {
	let reply = Reply::from_parts(b'*', vec![Some(Bytes::from("x")), None]).unwrap();
	assert_eq!(&reply.encode().unwrap()[..], b"*2\r\n$1\r\nx\r\n$-1\r\n");
}

#[test]
fn test_binary_bulk_payload_preserved() {
	let payload = Bytes::from_static(b"\x00\xff\r\n\x01");
	let reply = Reply::Bulk(Some(payload.clone()));
	let mut buf = BytesMut::from(&reply.encode().unwrap()[..]);
	assert_eq!(resp::parse_reply(&mut buf).unwrap(), Reply::Bulk(Some(payload)));
}

#[test]
fn test_command_with_binary_args_survives_reencoding() {
	let args = vec![
		Bytes::from_static(b"k\x00"),
		Bytes::new(),
		Bytes::from_static(b"a b\r\nc"),
	];
	let cmd = Command::new("HSET", args.clone()).unwrap();
	let mut buf = BytesMut::from(&cmd.encode().unwrap()[..]);
	let decoded = resp::parse_command(&mut buf).unwrap();
	assert_eq!(decoded.name(), "hset");
	assert_eq!(decoded.args(), args.as_slice());
	assert!(buf.is_empty());
}

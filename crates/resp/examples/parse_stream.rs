use bytes::BytesMut;
use resp::RespEncoder;
use resp::RespParseResult;
use resp::RespParser;

fn main() {
	println!("--- RESP Streaming Command Example ---");

	// Client traffic split into arbitrary chunks:
	// - an inline command: "PING\r\n"
	// - a multi-bulk command: "*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n"
	// - a legacy inline bulk command: "SET key 5\r\nvalue\r\n"
	let data_chunks = vec![
		b"PI".as_slice(),
		b"NG\r\n*2\r\n$3".as_slice(),
		b"\r\nGET\r\n$3\r\nk".as_slice(),
		b"ey\r\nSET key 5\r".as_slice(),
		b"\nval".as_slice(),
		b"ue\r\n".as_slice(),
	];

	let mut parser = RespParser::new();
	let mut buffer = BytesMut::new();

	for (i, chunk) in data_chunks.iter().enumerate() {
		println!("\n[Stream] Received Chunk {}: {:?}", i, chunk.escape_ascii().to_string());

		buffer.extend_from_slice(chunk);

		loop {
			match parser.parse_command(&mut buffer) {
				RespParseResult::Complete(cmd) => {
					println!("[Parser] Complete: {}", cmd);
					if let Ok(wire) = cmd.encode() {
						println!("[Parser] Forward as: {:?}", wire);
					}
				}
				RespParseResult::Incomplete => {
					println!("[Parser] Incomplete, waiting for more data...");
					break;
				}
				RespParseResult::Error(e) => {
					eprintln!("[Parser] Error: {:?}", e);
					break;
				}
			}
		}
	}
}

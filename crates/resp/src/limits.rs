/// Parser limits on peer-supplied lengths.
///
/// Enforced before any buffer is sized from a length prefix, so a peer
/// cannot make the proxy allocate more than these bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
	/// Maximum bulk string payload in bytes (default: 512MB, matches Redis)
	pub max_bulk_len: usize,
	/// Maximum number of elements in a multi-bulk value (default: 1,048,576)
	pub max_multibulk_len: usize,
	/// Maximum length of any single line: inline commands, length prefixes
	/// and scalar replies (default: 64KB)
	pub max_inline_len: usize,
}

impl Default for ParserLimits {
	fn default() -> Self {
		Self {
			max_bulk_len: 512 * 1024 * 1024,
			max_multibulk_len: 1024 * 1024,
			max_inline_len: 64 * 1024,
		}
	}
}

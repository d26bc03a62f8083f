use std::collections::HashSet;
use std::sync::Arc;
use std::sync::LazyLock;

use bytes::Bytes;

/// Commands that, sent inline, carry their last argument as a
/// length-prefixed payload following the line (`SET key 5\r\nvalue\r\n`).
const LEGACY_BULK_COMMANDS: &[&str] = &[
	// string type cmd
	"set", "setnx", "setex", "getset", "append", "echo",
	// list type cmd
	"rpush", "lpush", "rpushx", "lpushx", "linsert", "lset", "lrem",
	// set type cmd
	"sadd", "srem", "smove", "sismember",
	// zset type cmd
	"zadd", "zincrby", "zrem", "zscore", "zrank", "zrevrank",
	// hash type cmd
	"hset", "hsetnx", "hget", "hdel", "hexists",
	// pubsub
	"publish",
];

static LEGACY: LazyLock<Arc<CommandTable>> = LazyLock::new(|| Arc::new(CommandTable::new()));

/// Read-only classification of command names by inline framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
	bulk: HashSet<Bytes>,
}

impl Default for CommandTable {
	fn default() -> Self {
		Self::new()
	}
}

impl CommandTable {
	/// The built-in table of legacy bulk-style commands.
	pub fn new() -> Self {
		let bulk = LEGACY_BULK_COMMANDS
			.iter()
			.map(|name| Bytes::from_static(name.as_bytes()))
			.collect();
		Self { bulk }
	}

	/// Process-wide shared instance of the built-in table.
	pub fn legacy() -> Arc<CommandTable> {
		LEGACY.clone()
	}

	/// The built-in table plus `extra` names (case-insensitive).
	pub fn with_extra<I, S>(extra: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut table = Self::new();
		table.bulk.extend(
			extra
				.into_iter()
				.map(|name| Bytes::from(name.as_ref().to_ascii_lowercase())),
		);
		table
	}

	/// Whether `name` (already lowercased) uses bulk-style inline framing.
	pub fn is_bulk(&self, name: &[u8]) -> bool {
		self.bulk.contains(name)
	}

	pub fn len(&self) -> usize {
		self.bulk.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bulk.is_empty()
	}
}

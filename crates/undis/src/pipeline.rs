//! One client connection paired with one backend connection.
//!
//! Two tasks move values across the pair, one per direction. Each reads a
//! complete value, writes it to the other side and flushes before reading
//! the next. When a task stops it fires the pair's shutdown signal and the
//! other task stops too, so both sockets close.
//!
//! The one exception is a client that closes its write side between two
//! commands. The backend then sees EOF, but the reply task keeps running
//! until the backend closes, so replies to commands already forwarded
//! still reach the client.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use resp::Command;
use resp::CommandTable;
use resp::ParserLimits;
use resp::Reply;
use resp::RespError;
use resp::RespReader;
use resp::RespWriter;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::ProxyError;

/// Settings shared by every pair the acceptor creates.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
	pub connect_timeout: Duration,
	/// How long the client may stay silent; `None` waits forever
	pub idle_timeout: Option<Duration>,
	pub limits: ParserLimits,
	pub table: Arc<CommandTable>,
}

impl Default for PipelineOptions {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(5),
			idle_timeout: None,
			limits: ParserLimits::default(),
			table: CommandTable::legacy(),
		}
	}
}

impl From<&ServerConfig> for PipelineOptions {
	fn from(config: &ServerConfig) -> Self {
		Self {
			connect_timeout: config.connect_timeout(),
			idle_timeout: config.idle_timeout(),
			limits: config.parser_limits(),
			table: config.command_table(),
		}
	}
}

/// Which way a relay loop moves values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	ClientToBackend,
	BackendToClient,
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Direction::ClientToBackend => f.write_str("client->backend"),
			Direction::BackendToClient => f.write_str("backend->client"),
		}
	}
}

/// The step of a relay loop that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Read,
	Write,
	Flush,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Phase::Read => f.write_str("read"),
			Phase::Write => f.write_str("write"),
			Phase::Flush => f.write_str("flush"),
		}
	}
}

/// Why a relay loop stopped.
#[derive(Debug)]
pub enum LoopEnd {
	/// The source closed between two values.
	Eof,
	/// The other loop of the pair stopped first.
	Shutdown,
	/// The source sent nothing within the idle timeout.
	Idle,
	Failed { phase: Phase, error: RespError },
}

impl LoopEnd {
	fn failed(phase: Phase, error: RespError) -> Self {
		// Connection reset by peer (e.g. client crashed or closed abruptly)
		if matches!(&error, RespError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionReset) {
			return LoopEnd::Eof;
		}
		LoopEnd::Failed { phase, error }
	}

	/// The client is done sending but still waits for replies.
	fn is_half_close(&self, direction: Direction) -> bool {
		matches!(self, LoopEnd::Eof) && direction == Direction::ClientToBackend
	}
}

/// Outcome of one relay loop.
#[derive(Debug)]
pub struct LoopReport {
	pub forwarded: u64,
	pub end: LoopEnd,
}

/// Values that a relay loop can carry: commands one way, replies the other.
pub trait Relayed: fmt::Display + Send + Sync + Sized + 'static {
	fn read<R>(reader: &mut RespReader<R>) -> impl Future<Output = Result<Option<Self>, RespError>> + Send
	where
		R: AsyncRead + Unpin + Send + 'static;

	fn write<'a, W>(
		writer: &'a mut RespWriter<W>,
		value: &'a Self,
	) -> impl Future<Output = Result<(), RespError>> + Send + 'a
	where
		W: AsyncWrite + Unpin + Send + 'static;
}

impl Relayed for Command {
	fn read<R>(reader: &mut RespReader<R>) -> impl Future<Output = Result<Option<Self>, RespError>> + Send
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		reader.read_command()
	}

	fn write<'a, W>(
		writer: &'a mut RespWriter<W>,
		value: &'a Self,
	) -> impl Future<Output = Result<(), RespError>> + Send + 'a
	where
		W: AsyncWrite + Unpin + Send + 'static,
	{
		writer.write_command(value)
	}
}

impl Relayed for Reply {
	fn read<R>(reader: &mut RespReader<R>) -> impl Future<Output = Result<Option<Self>, RespError>> + Send
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		reader.read_reply()
	}

	fn write<'a, W>(
		writer: &'a mut RespWriter<W>,
		value: &'a Self,
	) -> impl Future<Output = Result<(), RespError>> + Send + 'a
	where
		W: AsyncWrite + Unpin + Send + 'static,
	{
		writer.write_reply(value)
	}
}

/// Per-loop context: who we serve and how we stop.
pub struct LoopContext {
	pub peer: SocketAddr,
	pub direction: Direction,
	pub idle_timeout: Option<Duration>,
	pub shutdown_tx: broadcast::Sender<()>,
	pub shutdown_rx: broadcast::Receiver<()>,
}

/// Move values of type `V` from `reader` to `writer` until either side
/// stops or the pair is shut down.
///
/// Shuts down `writer` on the way out. The pair's shutdown signal fires too,
/// unless the client closed cleanly and replies may still be in flight.
pub async fn relay<V, R, W>(
	mut reader: RespReader<R>,
	mut writer: RespWriter<W>,
	mut ctx: LoopContext,
) -> LoopReport
where
	V: Relayed,
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let mut forwarded = 0u64;

	let end = loop {
		let read = tokio::select! {
			_ = ctx.shutdown_rx.recv() => break LoopEnd::Shutdown,
			read = read_next::<V, R>(&mut reader, ctx.idle_timeout) => read,
		};

		let value = match read {
			Some(Ok(Some(value))) => value,
			Some(Ok(None)) => break LoopEnd::Eof,
			Some(Err(e)) => break LoopEnd::failed(Phase::Read, e),
			None => break LoopEnd::Idle,
		};
		trace!(peer = %ctx.peer, direction = %ctx.direction, "{}", value);

		// Values already read are delivered before a shutdown is noticed.
		if let Err(e) = V::write(&mut writer, &value).await {
			break LoopEnd::failed(Phase::Write, e);
		}
		if let Err(e) = writer.flush().await {
			break LoopEnd::failed(Phase::Flush, e);
		}
		forwarded += 1;
	};

	if !end.is_half_close(ctx.direction) {
		let _ = ctx.shutdown_tx.send(());
	}
	if let Err(e) = writer.shutdown().await {
		trace!(peer = %ctx.peer, direction = %ctx.direction, "shutdown of write half failed: {}", e);
	}
	log_end(&ctx, &end);

	LoopReport { forwarded, end }
}

/// `None` when the idle timeout elapsed first.
async fn read_next<V, R>(
	reader: &mut RespReader<R>,
	idle_timeout: Option<Duration>,
) -> Option<Result<Option<V>, RespError>>
where
	V: Relayed,
	R: AsyncRead + Unpin + Send + 'static,
{
	match idle_timeout {
		Some(limit) => tokio::time::timeout(limit, V::read(reader)).await.ok(),
		None => Some(V::read(reader).await),
	}
}

fn log_end(ctx: &LoopContext, end: &LoopEnd) {
	let peer = ctx.peer;
	let direction = ctx.direction;
	match end {
		LoopEnd::Eof => debug!(%peer, %direction, "source closed"),
		LoopEnd::Shutdown => debug!(%peer, %direction, "stopped by the other loop"),
		LoopEnd::Idle => info!(%peer, %direction, phase = "idle", "no data within idle timeout"),
		LoopEnd::Failed { phase, error } if error.is_unexpected_eof() => {
			warn!(%peer, %direction, %phase, "source closed in the middle of a value")
		}
		LoopEnd::Failed { phase, error } => warn!(%peer, %direction, %phase, "{}", error),
	}
}

/// Counters for one client connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
	pub commands: u64,
	pub replies: u64,
}

/// A client connection and its backend connection.
pub struct Pipeline {
	peer: SocketAddr,
	backend_addr: String,
	options: Arc<PipelineOptions>,
}

impl Pipeline {
	pub fn new(peer: SocketAddr, backend_addr: impl Into<String>, options: Arc<PipelineOptions>) -> Self {
		Self {
			peer,
			backend_addr: backend_addr.into(),
			options,
		}
	}

	/// Dial the backend and relay both ways until the pair shuts down.
	///
	/// Fails only if the backend connection cannot be established; the
	/// client socket is dropped, and so closed, in that case.
	pub async fn run(self, client: TcpStream) -> Result<PipelineStats, ProxyError> {
		let backend = connect(&self.backend_addr, self.options.connect_timeout).await?;
		if let Err(e) = backend.set_nodelay(true) {
			debug!(peer = %self.peer, "failed to set TCP_NODELAY on backend socket: {}", e);
		}
		debug!(peer = %self.peer, backend = %self.backend_addr, "established backend connection");

		let (client_read, client_write) = client.into_split();
		let (backend_read, backend_write) = backend.into_split();

		let limits = self.options.limits;
		let table = self.options.table.clone();
		let (shutdown_tx, _) = broadcast::channel(1);

		let commands = tokio::spawn(relay::<Command, _, _>(
			RespReader::with_config(client_read, limits, table.clone()),
			RespWriter::new(backend_write),
			LoopContext {
				peer: self.peer,
				direction: Direction::ClientToBackend,
				idle_timeout: self.options.idle_timeout,
				shutdown_tx: shutdown_tx.clone(),
				shutdown_rx: shutdown_tx.subscribe(),
			},
		));
		let replies = tokio::spawn(relay::<Reply, _, _>(
			RespReader::with_config(backend_read, limits, table),
			RespWriter::new(client_write),
			LoopContext {
				peer: self.peer,
				direction: Direction::BackendToClient,
				// a slow backend is not an idle client
				idle_timeout: None,
				shutdown_tx: shutdown_tx.clone(),
				shutdown_rx: shutdown_tx.subscribe(),
			},
		));
		drop(shutdown_tx);

		let (commands, replies) = tokio::join!(commands, replies);
		let stats = PipelineStats {
			commands: forwarded_count(self.peer, Direction::ClientToBackend, commands),
			replies: forwarded_count(self.peer, Direction::BackendToClient, replies),
		};
		info!(
			peer = %self.peer,
			commands = stats.commands,
			replies = stats.replies,
			"connection closed"
		);
		Ok(stats)
	}
}

fn forwarded_count(
	peer: SocketAddr,
	direction: Direction,
	joined: Result<LoopReport, tokio::task::JoinError>,
) -> u64 {
	match joined {
		Ok(report) => report.forwarded,
		Err(e) => {
			warn!(%peer, %direction, "relay task failed: {}", e);
			0
		}
	}
}

async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, ProxyError> {
	match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
		Ok(Ok(stream)) => Ok(stream),
		Ok(Err(source)) => Err(ProxyError::Connect {
			addr: addr.to_string(),
			source,
		}),
		Err(_) => Err(ProxyError::ConnectTimeout {
			addr: addr.to_string(),
			timeout,
		}),
	}
}

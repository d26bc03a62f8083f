use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::ProxyError;
use crate::pipeline::Pipeline;
use crate::pipeline::PipelineOptions;

/// Pause after a failed accept; errors such as EMFILE tend to repeat.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts clients and gives each one its own backend connection.
pub struct Server {
	listener: TcpListener,
	backend_addr: String,
	options: Arc<PipelineOptions>,
}

impl Server {
	/// Bind the listen address. Failing to bind is fatal to startup.
	pub async fn bind(
		listen_addr: &str,
		backend_addr: impl Into<String>,
		options: PipelineOptions,
	) -> Result<Self, ProxyError> {
		let listener = TcpListener::bind(listen_addr)
			.await
			.map_err(|source| ProxyError::Bind {
				addr: listen_addr.to_string(),
				source,
			})?;

		Ok(Self {
			listener,
			backend_addr: backend_addr.into(),
			options: Arc::new(options),
		})
	}

	pub async fn from_config(config: &ServerConfig) -> Result<Self, ProxyError> {
		Self::bind(
			&config.listen_addr,
			config.backend_addr.clone(),
			PipelineOptions::from(config),
		)
		.await
	}

	pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
		Ok(self.listener.local_addr()?)
	}

	pub fn backend_addr(&self) -> &str {
		&self.backend_addr
	}

	/// Serve until ctrl-c or SIGTERM.
	pub async fn run(self) -> Result<(), ProxyError> {
		self.run_until(shutdown_signal()).await
	}

	/// Serve until `shutdown` resolves.
	///
	/// Connection pairs already running are left to finish on their own.
	pub async fn run_until<F>(self, shutdown: F) -> Result<(), ProxyError>
	where
		F: Future<Output = ()>,
	{
		info!(
			"Undis proxy listening on {}, forwarding to {}",
			self.local_addr()?,
			self.backend_addr
		);
		tokio::pin!(shutdown);

		loop {
			let accepted = tokio::select! {
				_ = &mut shutdown => {
					info!("Shutdown signal received, no longer accepting connections");
					return Ok(());
				}
				accepted = self.listener.accept() => accepted,
			};

			match accepted {
				Ok((socket, peer)) => {
					debug!("New client connected from {}", peer);
					if let Err(e) = socket.set_nodelay(true) {
						warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
					}

					let pipeline = Pipeline::new(peer, self.backend_addr.clone(), self.options.clone());
					tokio::spawn(async move {
						if let Err(e) = pipeline.run(socket).await {
							error!("Error handling client {}: {}", peer, e);
						}
					});
				}
				Err(e) => back_off_after_accept_error(&e).await,
			}
		}
	}
}

async fn back_off_after_accept_error(e: &std::io::Error) {
	error!("Error accepting connection: {}", e);
	tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::SignalKind;
		use tokio::signal::unix::signal;

		match signal(SignalKind::terminate()) {
			Ok(mut sig) => {
				sig.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

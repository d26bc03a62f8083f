use undis::Server;
use undis::config::Cli;
use undis::config::Parser;
use undis::config::SERVER_CONF;
use undis::logo;
use undis::server_config;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let args = Cli::parse();
	undis::config::setup(args)?;

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.worker_threads(server_config!(worker_threads))
		.enable_all()
		.build()?;

	runtime.block_on(async {
		let config = SERVER_CONF.load();
		let server = Server::from_config(&config).await?;
		logo::show_logo(&config.listen_addr, &config.backend_addr);
		server.run().await
	})?;

	Ok(())
}

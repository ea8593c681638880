// pharmacy inventory

use pharmacy::{config::Config, sql, state::new_shared_state};
use tokio::{
	net::TcpListener,
	signal::{self, ctrl_c},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let dotenv = dotenvy::dotenv();
	fmt().with_env_filter(EnvFilter::from_default_env()).init();
	if let Err(e) = dotenv {
		warn!("No .env loaded: {e}");
	}

	let config = Config::load()?;
	let pool = sql::connect(&config).await?;

	let address = format!("0.0.0.0:{}", config.port);
	let app = pharmacy::app(new_shared_state(pool, config));

	let listener = TcpListener::bind(&address).await?;
	info!("Server running on {address}");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	info!("Server shut down");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		match ctrl_c().await {
			Ok(()) => info!("Received Ctrl+C, shutting down"),
			Err(e) => {
				warn!("Failed to listen for Ctrl+C: {e}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
				info!("Received terminate signal, shutting down");
			}
			Err(e) => {
				warn!("Failed to install terminate handler: {e}");
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

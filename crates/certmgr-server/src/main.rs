//! certmgr server binary.

use certmgr_server::{CertmgrServer, Cli, shutdown_signal, telemetry};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = Cli::parse().into_config();
    telemetry::init(config.log_format);

    info!(storage = ?config.storage, "starting certmgr");

    let server = match CertmgrServer::open(config) {
        Ok(server) => server,
        Err(e) => {
            error!("certmgr failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        error!("certmgr error: {}", e);
        std::process::exit(1);
    }
}

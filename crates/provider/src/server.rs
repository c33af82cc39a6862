//! Plugin process bootstrap
//!
//! Terraform launches the provider as a child process, then reads the
//! listening address off stdout and speaks gRPC to it.

use std::io::Write;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::provider::NutanixProvider;
use crate::tfplugin6::provider_server::ProviderServer;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Logs to stderr. `RUST_LOG` wins over Terraform's `TF_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = std::env::var("TF_LOG").unwrap_or_default().to_lowercase();
            EnvFilter::try_new(match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => level.as_str(),
                "json" => "trace",
                _ => "info",
            })
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Fails unless the process was started by Terraform.
pub fn check_magic_cookie(value: Option<&str>) -> Result<()> {
    if value != Some(MAGIC_COOKIE_VALUE) {
        bail!(
            "This binary is a plugin. These are not meant to be executed directly.\n\
             Please execute the program that consumes these plugins, which will\n\
             load any plugins automatically"
        );
    }
    Ok(())
}

pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc\n",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, addr
    )
}

/// Binds a loopback port, announces it and serves until Terraform hangs up.
pub async fn serve() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind the plugin listener")?;
    let addr = listener.local_addr()?;

    let provider = NutanixProvider::new();
    info!("Nutanix provider listening on {}", addr);

    {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(handshake_line(&addr).as_bytes())?;
        stdout.flush()?;
    }

    let incoming = futures::stream::unfold(listener, |listener| async move {
        let accepted = listener.accept().await.map(|(stream, _)| stream);
        Some((accepted, listener))
    });

    Server::builder()
        .add_service(ProviderServer::new(provider))
        .serve_with_incoming(incoming)
        .await
        .context("gRPC server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_must_match() {
        assert!(check_magic_cookie(Some(MAGIC_COOKIE_VALUE)).is_ok());
        assert!(check_magic_cookie(Some("nope")).is_err());
        assert!(check_magic_cookie(None).is_err());
    }

    #[test]
    fn handshake_names_protocol_six() {
        let addr: std::net::SocketAddr = "127.0.0.1:40123".parse().unwrap();
        assert_eq!(handshake_line(&addr), "1|6|tcp|127.0.0.1:40123|grpc\n");
    }
}

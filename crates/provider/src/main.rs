//! Terraform Provider for Nutanix
//!
//! Speaks the Terraform Plugin Protocol v6 for Prism Central, Karbon,
//! Volumes and NDB.

use terraform_provider_nutanix::server;
use tracing::error;

#[tokio::main]
async fn main() {
    let cookie = std::env::var(server::MAGIC_COOKIE_KEY).ok();
    if let Err(e) = server::check_magic_cookie(cookie.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    server::init_logging();

    if let Err(e) = server::serve().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

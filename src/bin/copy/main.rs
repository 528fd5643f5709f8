//! dmap-copy: lists the items of every share it discovers.
//!
//! Browses for shares, connects to each one as it appears and prints the
//! location of every shared item on stdout, one per line. Logs go to stderr.

mod config;

use anyhow::Result;
use dmap_rs::client::Client;
use dmap_rs::discovery::MdnsBrowser;
use dmap_rs::event_loop::EventLoop;
use dmap_rs::record::factory_for;
use dmap_rs::session::TcpConnector;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_or_default("dmap-copy.toml")?;
    let service_type = config.service_type()?;

    let event_loop = EventLoop::new();
    let connector = TcpConnector::new(config.client_name.clone(), config.connect_timeout());

    let mut client = Client::new(
        MdnsBrowser::new(),
        service_type,
        connector,
        factory_for(service_type.share_kind()),
        std::io::stdout(),
        event_loop.handle(),
    )?;

    event_loop.run(&mut client).await?;
    Ok(())
}

//! dmap-server: shares one test item over DAAP or DPAP.
//!
//! Usage: `dmap-server [kind]` where kind is 0 (audio, default) or 1 (image).
//! The server builds the share, serves it, advertises it over mDNS and then
//! runs until the share reports an error.

mod config;

use anyhow::{Context, Result};
use dmap_rs::constants::ShareKind;
use dmap_rs::discovery::MdnsPublisher;
use dmap_rs::event_loop::EventLoop;
use dmap_rs::share::{ShareHost, create_share};
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let kind = match std::env::args().nth(1) {
        Some(arg) => {
            let value: u32 = arg
                .parse()
                .with_context(|| format!("share kind must be 0 or 1, got '{}'", arg))?;
            ShareKind::try_from(value)?
        }
        None => ShareKind::Audio,
    };

    let config = Config::load_or_default("dmap-server.toml")?;

    println!("╔════════════════════════════════════════╗");
    println!("║            dmap-server                 ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Share: {:<32}║", config.name);
    println!("║ Kind: {:<33}║", format!("{:?}", kind));
    println!("╚════════════════════════════════════════╝");

    let event_loop = EventLoop::new();
    let mut publisher = MdnsPublisher::new(config.advertise_addr)?;

    let share = create_share(
        kind,
        &config.share_config(),
        &mut publisher,
        event_loop.handle(),
    )
    .await?;
    let mut host = ShareHost::new(share);

    event_loop.run(&mut host).await?;
    Ok(())
}

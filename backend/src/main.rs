//! Tandem - blind secret equality
//!
//! ```bash
//! # Run the server
//! tandem serve --port 8080
//!
//! # Open a room and print the invite link for the other person
//! tandem host --server http://localhost:8080
//!
//! # Accept an invite
//! tandem join 'http://localhost:8080/ABCDEFGH#0123456789abcdef0123456789abcdef'
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem::{
    handler, EqualityPeer, Invite, InviteLink, RendezvousClient, RendezvousService, ServiceConfig,
    Verdict,
};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "tandem")]
#[command(about = "Check whether two people hold the same secret without revealing it")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the rendezvous server.
    Serve(ServeArgs),

    /// Open a room, print the invite link, then compare.
    Host {
        /// Base URL of the rendezvous server.
        #[arg(short, long, env = "TANDEM_SERVER", default_value = "http://localhost:8080")]
        server: String,

        /// Secret to compare. Read from stdin if omitted.
        #[arg(long)]
        secret: Option<String>,
    },

    /// Accept an invite link and compare.
    Join {
        /// Invite link of the form `{server}/{room_id}#{salt}`.
        link: String,

        /// Secret to compare. Read from stdin if omitted.
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    /// Address to bind to.
    #[arg(short, long, env = "TANDEM_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Seconds a join or submit is held open before giving up. 0 never gives up.
    #[arg(long, env = "TANDEM_HOLD_TIMEOUT", default_value = "30")]
    hold_timeout: u64,

    /// Seconds after which a room nobody is waiting in is dropped.
    #[arg(long, env = "TANDEM_ROOM_TTL", default_value = "3600")]
    room_ttl: u64,

    /// Interval in seconds for cleaning up expired rooms.
    #[arg(long, default_value = "60")]
    cleanup_interval: u64,
}

impl ServeArgs {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            hold_timeout: (self.hold_timeout > 0).then(|| Duration::from_secs(self.hold_timeout)),
            room_ttl: Duration::from_secs(self.room_ttl),
        }
    }
}

/// Spawn a background task to periodically drop idle rooms.
fn spawn_cleanup_task(service: Arc<RendezvousService>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            service.cleanup_expired();
        }
    });
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.service_config();
    info!(?config, "Starting rendezvous server");

    let service = Arc::new(RendezvousService::new(config));
    spawn_cleanup_task(
        Arc::clone(&service),
        Duration::from_secs(args.cleanup_interval.max(1)),
    );

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, handler::router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Use the given secret, or prompt for one on stdin.
async fn read_secret(secret: Option<String>) -> anyhow::Result<String> {
    if let Some(secret) = secret {
        return Ok(secret);
    }

    eprintln!("Enter the secret to compare:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read secret")?;
    Ok(line)
}

fn report(verdict: Verdict, secret: &str) {
    let detail = if verdict.matched {
        "You both entered"
    } else {
        "The other person did not enter"
    };
    println!("{verdict}");
    println!("{detail} the string {:?}", secret.trim());
}

/// Joins before prompting, so the other side is not held while the secret is typed.
async fn compare(
    peer: &EqualityPeer<'_, RendezvousClient>,
    invite: &Invite,
    secret: Option<String>,
) -> anyhow::Result<()> {
    let room_id = invite.room_id;
    eprintln!("Waiting for the other person to join room {room_id}...");
    peer.join(invite)
        .await
        .with_context(|| format!("failed to join room {room_id}"))?;

    let secret = read_secret(secret).await?;
    eprintln!("Waiting for the other person to submit...");
    let verdict = peer
        .submit(invite, &secret)
        .await
        .with_context(|| format!("comparison in room {room_id} failed"))?;
    report(verdict, &secret);
    Ok(())
}

async fn host(server: String, secret: Option<String>) -> anyhow::Result<()> {
    let client = RendezvousClient::new(&server);
    let peer = EqualityPeer::new(&client);

    let invite = peer.host().await.context("failed to create room")?;
    println!("{}", InviteLink::new(client.base_url(), invite.clone()));

    compare(&peer, &invite, secret).await
}

async fn join(link: String, secret: Option<String>) -> anyhow::Result<()> {
    let link: InviteLink = link.parse()?;
    let client = RendezvousClient::new(&link.server);
    let peer = EqualityPeer::new(&client);

    compare(&peer, &link.invite, secret).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so that stdout only carries the invite link and verdict
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("tandem=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve(args) => serve(args).await,
        Command::Host { server, secret } => host(server, secret).await,
        Command::Join { link, secret } => join(link, secret).await,
    }
}

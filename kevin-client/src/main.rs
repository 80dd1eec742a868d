use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use kevin::api::ApiClient;
use kevin::config::ConfigManager;
use kevin::echo::{lock_echo, EchoRegistry, Outbox, PostEcho, Reconciler, SharedEcho};
use kevin::identity_store::IdentityStore;
use kevin::logging::{init_logging, LogConfig};
use kevin_types::{FeedPost, Identity, PostId, Role};

/// ¿Dónde está Kevin? - follow Kevin's sightings from the terminal
#[derive(Parser)]
#[command(name = "kevin")]
#[command(about = "Browse Kevin's sightings, like them and leave comments")]
#[command(version)]
struct Cli {
    /// Server URL to connect to
    #[arg(long, short, global = true, env = "KEVIN_SERVER_URL")]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choose the username you comment and like as. A `--server` given here is remembered.
    Login {
        username: String,
        /// Log in as Kevin, who can publish sightings
        #[arg(long)]
        kevin: bool,
    },
    /// Forget the chosen username
    Logout,
    /// Show the current username and role
    Whoami,
    /// Show all sightings, newest first
    Feed,
    /// Like a sighting, or unlike it if you already do
    Like { post_id: PostId },
    /// Comment on a sighting
    Comment { post_id: PostId, text: String },
    /// Publish a new sighting (Kevin only)
    Post {
        #[arg(long)]
        image: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Resend changes that never got a confirmation
    Sync,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Allows KEVIN_SERVER_URL to be set from a .env file
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let config = ConfigManager::new()?;

    let log_config = if cli.verbose {
        LogConfig::verbose(config.log_path())
    } else {
        LogConfig::default().with_file(config.log_path())
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging disabled ({})", e);
    }

    let server_override = cli.server.clone();
    let server_url = config.determine_server_url(cli.server)?;
    log::debug!("Using server {}", server_url);
    let client = ApiClient::new(server_url);
    let identities = IdentityStore::new(config.identity_path());

    match cli.command {
        Command::Login { username, kevin } => {
            let role = if kevin { Role::Kevin } else { Role::Seeker };
            let identity = Identity::new(username, role)?;
            identities.save(&identity)?;
            println!("Hola, {}! You are signed in as {}.", identity.username, identity.role.as_str());
            if let Some(url) = server_override {
                config.remember_server_url(&url)?;
                println!("Using {} from now on.", url);
            }
        }
        Command::Logout => {
            identities.delete()?;
            println!("Logged out.");
        }
        Command::Whoami => match identities.load()? {
            Some(identity) => println!("{} ({})", identity.username, identity.role.as_str()),
            None => println!("No username chosen yet. Run `kevin login <username>`."),
        },
        Command::Feed => {
            let feed = client.get_feed().await?;
            if feed.is_empty() {
                println!("No sightings yet. Kevin is hiding well.");
            }
            for post in &feed {
                print_post(post);
            }
        }
        Command::Like { post_id } => {
            let identity = require_identity(&identities)?;
            let reconciler = Reconciler::new(client.clone(), Outbox::open(config.outbox_path())?);
            let echo = load_echo(&client, post_id).await?;

            let outcome = reconciler.toggle_like(&identity, &echo).await?;
            let verb = if outcome.liked { "Liked" } else { "Unliked" };
            println!("{} sighting #{} ({} likes)", verb, post_id, outcome.like_count);
        }
        Command::Comment { post_id, text } => {
            let identity = require_identity(&identities)?;
            let reconciler = Reconciler::new(client.clone(), Outbox::open(config.outbox_path())?);
            let echo = load_echo(&client, post_id).await?;

            let outcome = reconciler.add_comment(&identity, &echo, &text).await?;
            if !outcome.refreshed {
                println!("Comment saved, but the latest comments could not be loaded.");
            }
            for comment in lock_echo(&echo).comments() {
                let marker = if comment.is_placeholder() { " (sending)" } else { "" };
                println!("  {}: {}{}", comment.username, comment.text, marker);
            }
        }
        Command::Post {
            image,
            lat,
            lon,
            caption,
        } => {
            let identity = require_identity(&identities)?;
            if !identity.is_kevin() {
                bail!("Only Kevin can publish sightings. Use `kevin login <username> --kevin`.");
            }

            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let response = client
                .create_post(file_name_of(&image), bytes, caption, lat, lon)
                .await?;
            println!("{} (#{})", response.message, response.post.id);
            println!("  {}", response.post.image_url);
        }
        Command::Sync => {
            let outbox = Outbox::open(config.outbox_path())?;
            if outbox.is_empty() {
                println!("Nothing to sync.");
                return Ok(());
            }

            let reconciler = Reconciler::new(client.clone(), outbox);
            let report = reconciler.replay(&EchoRegistry::new()).await;
            println!("Synced {} pending changes.", report.replayed.len());
            for failure in &report.failed {
                println!("  {}", failure);
            }
            if report.discarded > 0 {
                println!("Dropped {} changes the server will never accept.", report.discarded);
            }
        }
    }

    Ok(())
}

fn require_identity(identities: &IdentityStore) -> Result<Identity> {
    identities
        .load()?
        .context("No username chosen yet. Run `kevin login <username>` first.")
}

async fn load_echo(client: &ApiClient, post_id: PostId) -> Result<SharedEcho> {
    let post = client.get_post(post_id).await?;
    Ok(Arc::new(Mutex::new(PostEcho::from_feed_post(&post))))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sighting.jpg".to_string())
}

fn print_post(post: &FeedPost) {
    println!(
        "#{} {} at ({:.4}, {:.4})",
        post.post.id,
        post.post.created_at.format("%Y-%m-%d %H:%M"),
        post.post.latitude,
        post.post.longitude
    );
    if let Some(caption) = &post.post.comment {
        println!("  {}", caption);
    }
    println!("  {}", post.post.image_url);
    println!("  {} likes, {} comments", post.like_count(), post.comments.len());
    for comment in &post.comments {
        println!("    {}: {}", comment.username, comment.text);
    }
}

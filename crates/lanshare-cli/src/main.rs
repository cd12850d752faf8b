use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use lanshare_core::{
    Client, ClientConfig, DownloadOutcome, FileEntry, FileId, Peer, ShareRequest,
};

mod shell;

#[derive(Parser, Debug)]
#[command(name = "lanshare", version, about = "LanShare LAN file sharing client")]
struct Cli {
    /// Set log level: error,warn,info,debug,trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file (default: ~/.lanshare/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend API root, e.g. http://localhost:19001/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory downloads are saved to
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the username held by the backend
    Whoami,

    /// Pick the username for this session
    Login {
        name: String,
    },

    /// List peers on the network
    Peers,

    /// List the files we share
    Files,

    /// List the files a peer shares
    Browse {
        /// Peer address (host:port)
        peer: String,
    },

    /// Share one or more files
    Share {
        /// Paths as seen by the backend
        #[arg(required = true)]
        paths: Vec<String>,

        /// Protect every file with this password
        #[arg(long, default_value = "")]
        password: String,
    },

    /// Stop sharing a file
    Unshare {
        id: String,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Download a file from a peer
    Download {
        /// Peer address (host:port)
        peer: String,

        file_id: String,

        /// Password for protected files
        #[arg(long)]
        password: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },

    /// Interactive session with background polling (default)
    Shell,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg_path = cli.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_config(&cfg_path, &cli)?;

    if let Some(Commands::Config { save }) = &cli.cmd {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        if *save {
            cfg.save(&cfg_path)?;
            println!("✓ Saved to {}", cfg_path.display());
        }
        return Ok(());
    }

    let client = Client::connect(&cfg)?;

    match cli.cmd.unwrap_or(Commands::Shell) {
        Commands::Whoami => match client.identity().resolve().await {
            Some(name) => println!("{}", name),
            None => println!("No username set. Run 'lanshare login <name>' to pick one."),
        },

        Commands::Login { name } => {
            let accepted = client.identity().set(&name).await?;
            println!("✓ Username set to: {}", accepted);
        }

        Commands::Peers => {
            require_identity(&client).await?;
            client.roster().fetch_peers().await?;
            print_peers(&client.session().peers());
        }

        Commands::Files => {
            require_identity(&client).await?;
            client.roster().fetch_own_files().await?;
            print_files(&client.session().own_files(), "You are not sharing any files.");
        }

        Commands::Browse { peer } => {
            let peer = lookup_peer(&client, &peer).await?;
            let files = client.catalog().select_peer(peer.clone()).await?.unwrap_or_default();
            println!("Files shared by {}:", peer);
            print_files(&files, "No files shared by this peer.");
        }

        Commands::Share { paths, password } => {
            require_identity(&client).await?;
            let requests: Vec<ShareRequest> = paths
                .iter()
                .map(|p| ShareRequest::new(p.as_str(), password.as_str()))
                .collect();

            let results = client.shares().share_files(&requests).await;
            let mut failed = 0;
            for (request, result) in requests.iter().zip(results) {
                match result {
                    Ok(id) => println!("✓ {} shared (ID: {})", request.path, id),
                    Err(e) => {
                        failed += 1;
                        println!("✗ {}: {}", request.path, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} file(s) could not be shared", failed, requests.len());
            }
        }

        Commands::Unshare { id, yes } => {
            require_identity(&client).await?;
            // Only used to name the file in the question.
            let _ = client.roster().fetch_own_files().await;

            let confirmation = client.shares().prepare_unshare(&FileId::from(id))?;
            if !yes {
                let answer = prompt(&format!("{} [y/N] ", confirmation.prompt())).await?;
                if !is_yes(&answer) {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let id = confirmation.id().clone();
            client.shares().confirm_unshare(confirmation).await?;
            println!("✓ File {} is no longer shared", id);
        }

        Commands::Download { peer, file_id, password } => {
            cfg.ensure_download_dir()?;
            let peer = lookup_peer(&client, &peer).await?;
            let files = client.catalog().select_peer(peer.clone()).await?.unwrap_or_default();
            let file_id = FileId::from(file_id);
            let file = files
                .iter()
                .find(|f| f.id == file_id)
                .with_context(|| format!("{} does not share a file with ID {}", peer, file_id))?;

            println!("Downloading {} from {}...", file.summary(), peer);
            let mut outcome = client.downloads().request_download(&peer, file).await?;
            if outcome == DownloadOutcome::PasswordRequired {
                let password = match password {
                    Some(pw) => pw,
                    None => prompt("Password: ").await?,
                };
                outcome = client.downloads().submit_password(&password).await?;
            }
            match outcome {
                DownloadOutcome::Completed(path) => println!("✓ Saved to {}", path.display()),
                other => anyhow::bail!("Download did not complete: {:?}", other),
            }
        }

        Commands::Shell => {
            cfg.ensure_download_dir()?;
            println!("Downloads go to {}", cfg.download_dir.display());
            shell::run(client).await?
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lanshare")
        .join("config.json")
}

/// Config file (if any) with command line overrides applied.
fn load_config(path: &PathBuf, cli: &Cli) -> Result<ClientConfig> {
    let mut cfg = if path.exists() {
        ClientConfig::load(path)?
    } else {
        ClientConfig::default()
    };
    if let Some(url) = &cli.api_url {
        cfg = cfg.with_api_base_url(url.clone());
    }
    if let Some(dir) = &cli.download_dir {
        cfg = cfg.with_download_dir(dir.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn require_identity(client: &Client) -> Result<String> {
    client
        .identity()
        .resolve()
        .await
        .context("Username not set. Run 'lanshare login <name>' first.")
}

/// Split `host:port`, accepting `[v6]:port` too.
fn parse_peer_addr(s: &str) -> Result<(String, u16)> {
    let (host, port) = s
        .rsplit_once(':')
        .with_context(|| format!("Expected host:port, got '{}'", s))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        anyhow::bail!("Expected host:port, got '{}'", s);
    }
    let port = port
        .parse()
        .with_context(|| format!("Invalid port in '{}'", s))?;
    Ok((host.to_string(), port))
}

/// Name the peer from the roster when we can; browsing does not need an
/// identity, so fall back to the bare address.
async fn lookup_peer(client: &Client, addr: &str) -> Result<Peer> {
    let (address, port) = parse_peer_addr(addr)?;
    if client.identity().resolve().await.is_some() {
        let _ = client.roster().fetch_peers().await;
    }
    let known = client
        .session()
        .peers()
        .into_iter()
        .find(|p| p.address == address && p.port == port);
    Ok(known.unwrap_or_else(|| Peer {
        username: address.clone(),
        address,
        port,
    }))
}

async fn prompt(question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn print_peers(peers: &[Peer]) {
    if peers.is_empty() {
        println!("No peers found.");
        return;
    }
    for (i, peer) in peers.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, peer);
    }
}

pub(crate) fn print_files(files: &[FileEntry], empty: &str) {
    if files.is_empty() {
        println!("{}", empty);
        return;
    }
    for (i, file) in files.iter().enumerate() {
        println!("  {:>2}. {}  [ID: {}]", i + 1, file.summary(), file.id);
    }
}

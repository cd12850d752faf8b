//! Interactive session: roster and own shares are polled in the background
//! while commands are read from stdin.
//!
//! Commands that talk to the backend run as tasks, so the prompt keeps
//! accepting input while they are in flight. A newer `open` or `get`
//! supersedes one that has not answered yet.

use anyhow::{Context, Result};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;

use lanshare_core::{
    CatalogView, Client, DownloadOutcome, DownloadState, Session, UnshareConfirmation,
};

use crate::{is_yes, print_files, print_peers};

const HELP: &str = "\
Commands:
  peers                     list peers on the network
  files                     list the files you share
  open <n>                  browse peer number n
  ls                        show the open peer's files again
  get <n>                   download file number n from the open peer
  password <pw>             answer a password prompt
  retry                     retry a failed download
  share <path> [password]   share a file (path on the backend's machine;
                            quote it if it contains spaces)
  unshare <n>               stop sharing your file number n
  login <name>              pick your username
  status                    show session state
  help                      show this help
  quit                      leave";

type Tasks = JoinSet<Result<()>>;

enum Flow {
    Continue,
    Quit,
}

struct Shell {
    client: Client,
    /// An unshare waiting for its y/n answer.
    pending_unshare: Option<UnshareConfirmation>,
}

pub async fn run(client: Client) -> Result<()> {
    println!("LanShare interactive shell. Type 'help' for commands.");
    match client.resolve_identity().await {
        Some(name) => println!("✓ Logged in as {}", name),
        None => println!("No username set. Use 'login <name>' to pick one."),
    }

    let mut shell = Shell::new(client);
    let mut tasks = Tasks::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match shell.handle(line.trim(), &mut tasks) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("✗ {}", e),
                }
            }
            Some(done) = tasks.join_next() => {
                match done {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => println!("✗ {}", e),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => println!("✗ command failed: {}", e),
                }
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    tasks.abort_all();
    shell.client.shutdown();
    Ok(())
}

fn parse_index(arg: &str, len: usize, what: &str) -> Result<usize> {
    let n: usize = arg
        .trim()
        .parse()
        .with_context(|| format!("Expected a {} number, got '{}'", what, arg))?;
    if n == 0 || n > len {
        anyhow::bail!("No {} number {} (there are {})", what, n, len);
    }
    Ok(n - 1)
}

/// `<path> [password]`, where the path may be wrapped in double quotes.
fn parse_share_args(rest: &str) -> Result<(String, String)> {
    let rest = rest.trim();
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"').context("Missing closing quote in path")?;
        let password = quoted[end + 1..].trim();
        return Ok((quoted[..end].to_string(), password.to_string()));
    }
    let (path, password) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Ok((path.to_string(), password.trim().to_string()))
}

impl Shell {
    fn new(client: Client) -> Self {
        Self {
            client,
            pending_unshare: None,
        }
    }

    /// Run `command` against a clone of the client without waiting for it.
    fn spawn<F, Fut>(&self, tasks: &mut Tasks, command: F)
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tasks.spawn(command(self.client.clone()));
    }

    fn handle(&mut self, line: &str, tasks: &mut Tasks) -> Result<Flow> {
        if let Some(confirmation) = self.pending_unshare.take() {
            if is_yes(line) {
                self.spawn(tasks, |client| async move {
                    client.shares().confirm_unshare(confirmation).await?;
                    println!("✓ File unshared");
                    Ok(())
                });
            } else {
                println!("Cancelled.");
            }
            return Ok(Flow::Continue);
        }

        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        tracing::debug!("Shell command: {}", cmd);
        let session = self.client.session();

        match cmd {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "quit" | "exit" => return Ok(Flow::Quit),

            "login" => {
                let name = rest.to_string();
                self.spawn(tasks, |client| async move {
                    let name = client.set_identity(&name).await?;
                    println!("✓ Logged in as {}", name);
                    Ok(())
                });
            }

            "peers" => print_peers(&session.peers()),

            "files" => {
                session.require_identity()?;
                print_files(&session.own_files(), "You are not sharing any files.");
            }

            "open" => {
                let peers = session.peers();
                let peer = peers[parse_index(rest, peers.len(), "peer")?].clone();
                println!("Loading files from {}...", peer);
                self.spawn(tasks, |client| async move {
                    // `None`: another peer was opened meanwhile.
                    if client.catalog().select_peer(peer).await?.is_some() {
                        show_catalog(client.session());
                    }
                    Ok(())
                });
            }

            "ls" => show_catalog(session),

            "get" => {
                let peer = session
                    .selected_peer()
                    .context("No peer open. Use 'open <n>' first.")?;
                let catalog = session.catalog();
                let files = catalog.entries();
                let file = files[parse_index(rest, files.len(), "file")?].clone();
                println!("Requesting {}...", file.summary());
                self.spawn(tasks, |client| async move {
                    report(client.downloads().request_download(&peer, &file).await?);
                    Ok(())
                });
            }

            "password" => {
                let password = rest.to_string();
                self.spawn(tasks, |client| async move {
                    report(client.downloads().submit_password(&password).await?);
                    Ok(())
                });
            }

            "retry" => {
                self.spawn(tasks, |client| async move {
                    report(client.downloads().retry().await?);
                    Ok(())
                });
            }

            "share" => {
                let (path, password) = parse_share_args(rest)?;
                self.spawn(tasks, |client| async move {
                    let id = client.shares().share_file(&path, &password).await?;
                    println!("✓ {} shared (ID: {})", path, id);
                    Ok(())
                });
            }

            "unshare" => {
                let own = session.own_files();
                let file = &own[parse_index(rest, own.len(), "file")?];
                let confirmation = self.client.shares().prepare_unshare(&file.id)?;
                println!("{} [y/N]", confirmation.prompt());
                self.pending_unshare = Some(confirmation);
            }

            "status" => self.show_status(),

            other => println!("Unknown command '{}'. Type 'help' for commands.", other),
        }
        Ok(Flow::Continue)
    }

    fn show_status(&self) {
        let session = self.client.session();
        println!("Username:  {}", session.identity().as_deref().unwrap_or("(not set)"));
        println!(
            "Polling:   {}",
            if self.client.roster().is_running() { "on" } else { "off" }
        );
        println!("Peers:     {}", session.peers().len());
        println!("Sharing:   {} file(s)", session.own_files().len());
        if let Some(peer) = session.selected_peer() {
            println!("Browsing:  {}", peer);
        }
        let download = match session.download_state() {
            DownloadState::Idle => "idle".to_string(),
            DownloadState::PasswordPrompted => "waiting for password".to_string(),
            DownloadState::Transferring => "transferring".to_string(),
            DownloadState::Completed { file_name, saved_to } => {
                format!("{} saved to {}", file_name, saved_to.display())
            }
            DownloadState::Failed { message } => format!("failed: {}", message),
        };
        match session.pending_download() {
            Some(pending) => println!("Download:  {} ({})", pending.file_name, download),
            None => println!("Download:  {}", download),
        }
    }
}

fn show_catalog(session: &Session) {
    let peer = match session.selected_peer() {
        Some(peer) => peer,
        None => {
            println!("No peer open. Use 'open <n>' first.");
            return;
        }
    };
    match session.catalog() {
        CatalogView::NoSelection => println!("No peer open. Use 'open <n>' first."),
        CatalogView::Loading => println!("Still loading files from {}...", peer),
        CatalogView::Loaded(files) => {
            println!("Files shared by {}:", peer);
            print_files(&files, "No files shared by this peer.");
        }
        CatalogView::Failed(message) => println!("✗ {}", message),
    }
}

fn report(outcome: DownloadOutcome) {
    match outcome {
        DownloadOutcome::PasswordRequired => {
            println!("This file is password protected. Use 'password <pw>'.")
        }
        DownloadOutcome::Completed(path) => println!("✓ Saved to {}", path.display()),
        DownloadOutcome::Superseded => println!("Download replaced by a newer request."),
    }
}

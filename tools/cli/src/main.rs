//! passdeck CLI - Command line front-end for a pass password store.
//!
//! This tool drives the same store model and mutation engine a desktop
//! front-end would: browsing, filtering, editing, and time-limited
//! clipboard copies.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use passdeck_app::{PassDeck, Settings};
use passdeck_common::EntryPath;
use passdeck_secret::{CharsetPolicy, Clipboard, PendingSecret};
use passdeck_store::{Confirmation, EntryContent, StoreNode};

#[derive(Parser)]
#[command(name = "passdeck")]
#[command(about = "passdeck - Browse and edit a pass password store")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: <config dir>/passdeck/settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Password store directory, overriding the settings file.
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CharsetArg {
    /// Letters, digits and punctuation.
    All,
    /// Letters only.
    Letters,
    /// Digits only.
    Digits,
    /// Letters and digits.
    Alphanumeric,
}

impl From<CharsetArg> for CharsetPolicy {
    fn from(arg: CharsetArg) -> Self {
        match arg {
            CharsetArg::All => CharsetPolicy::All,
            CharsetArg::Letters => CharsetPolicy::Letters,
            CharsetArg::Digits => CharsetPolicy::Digits,
            CharsetArg::Alphanumeric => CharsetPolicy::Alphanumeric,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List entries as a tree.
    Ls {
        /// Directory to list (default: store root).
        path: Option<String>,
    },

    /// List entries whose path contains a string, ignoring case.
    Find {
        /// Search string.
        query: String,
    },

    /// Show an entry.
    Show {
        /// Entry path.
        path: String,

        /// Copy the password to the clipboard instead of printing.
        #[arg(short, long)]
        clip: bool,
    },

    /// Insert a new entry.
    Insert {
        /// Entry path.
        path: String,

        /// Notes stored below the password.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Change the password of an entry, keeping its notes.
    Edit {
        /// Entry path.
        path: String,
    },

    /// Generate a password, storing it when a path is given.
    Generate {
        /// Entry path to create.
        path: Option<String>,

        /// Password length (default from settings).
        #[arg(short, long)]
        length: Option<usize>,

        /// Character set (default from settings).
        #[arg(long, value_enum, conflicts_with = "chars")]
        charset: Option<CharsetArg>,

        /// Draw from exactly these characters.
        #[arg(long)]
        chars: Option<String>,

        /// Copy to the clipboard instead of printing.
        #[arg(short, long)]
        clip: bool,
    },

    /// Rename or move an entry.
    Mv {
        /// Existing entry.
        old: String,

        /// New path.
        new: String,

        /// Replace an existing entry at the new path.
        #[arg(short, long)]
        force: bool,
    },

    /// Remove an entry or a directory with everything in it.
    Rm {
        /// Path to remove.
        path: String,

        /// Do not ask for confirmation.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print the effective settings.
    Config {
        /// Write them to the settings file.
        #[arg(long)]
        save: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Settings::default_path(),
    };

    let mut settings = match &settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(store) = cli.store {
        settings.store_dir = store;
    }
    debug!(store = %settings.store_dir.display(), backend = %settings.backend, "Settings loaded");

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "passdeck", &mut std::io::stdout());
            Ok(())
        }

        Commands::Config { save } => cmd_config(&settings, settings_path, save),

        command => {
            let deck = PassDeck::open(settings, clipboard())
                .await
                .context("Failed to open password store")?;

            let result = match command {
                Commands::Ls { path } => cmd_ls(&deck, path.as_deref()).await,
                Commands::Find { query } => cmd_find(&deck, &query).await,
                Commands::Show { path, clip } => cmd_show(&deck, &path, clip).await,
                Commands::Insert { path, notes } => cmd_insert(&deck, &path, notes).await,
                Commands::Edit { path } => cmd_edit(&deck, &path).await,
                Commands::Generate {
                    path,
                    length,
                    charset,
                    chars,
                    clip,
                } => {
                    let policy = match (chars, charset) {
                        (Some(chars), _) => Some(CharsetPolicy::Custom(chars)),
                        (None, Some(charset)) => Some(charset.into()),
                        (None, None) => None,
                    };
                    cmd_generate(&deck, path.as_deref(), length, policy, clip).await
                }
                Commands::Mv { old, new, force } => cmd_mv(&deck, &old, &new, force).await,
                Commands::Rm { path, yes } => cmd_rm(&deck, &path, yes).await,
                Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
            };

            deck.close().await;
            result
        }
    }
}

#[cfg(feature = "system-clipboard")]
fn clipboard() -> Arc<dyn Clipboard> {
    Arc::new(passdeck_secret::SystemClipboard::new())
}

#[cfg(not(feature = "system-clipboard"))]
fn clipboard() -> Arc<dyn Clipboard> {
    Arc::new(passdeck_secret::MemoryClipboard::new())
}

fn parse_path(raw: &str) -> Result<EntryPath> {
    EntryPath::parse(raw).with_context(|| format!("Invalid entry path '{}'", raw))
}

/// Prompt for a password without echo.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Prompt for a new password twice.
fn prompt_new_password(path: &EntryPath) -> Result<Zeroizing<String>> {
    let password = prompt_password(&format!("Enter password for {}: ", path))?;
    let confirm = prompt_password(&format!("Retype password for {}: ", path))?;

    if *password != *confirm {
        anyhow::bail!("Passwords do not match");
    }
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Ask a yes/no question on the terminal.
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Keep the secret on the clipboard until it expires or Ctrl-C.
async fn hold_clipboard(deck: &PassDeck, what: &str) -> Result<()> {
    if cfg!(not(feature = "system-clipboard")) {
        anyhow::bail!("This build has no clipboard support");
    }

    let ttl = deck.settings().clipboard_ttl();
    println!(
        "Copied {} to clipboard. Will clear in {} seconds.",
        what,
        ttl.as_secs()
    );

    tokio::select! {
        _ = tokio::time::sleep(ttl) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    deck.clear_clipboard().context("Failed to clear clipboard")?;
    Ok(())
}

/// Print the tree below a directory.
async fn cmd_ls(deck: &PassDeck, path: Option<&str>) -> Result<()> {
    let dir = match path {
        Some(raw) => parse_path(raw)?,
        None => EntryPath::root(),
    };

    let tree = deck.session().tree().await;
    let node = tree
        .resolve(&dir)
        .with_context(|| format!("{} is not in the password store", dir))?;

    if dir.is_root() {
        println!("Password Store");
    } else {
        println!("{}", dir);
    }
    print_children(node, "");
    Ok(())
}

fn print_children(node: &StoreNode, prefix: &str) {
    let children = node.children();
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        println!("{}{}{}", prefix, branch, child.name());

        if child.is_directory() {
            let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
            print_children(child, &nested);
        }
    }
}

/// List matching entries.
async fn cmd_find(deck: &PassDeck, query: &str) -> Result<()> {
    let matches = deck.set_filter(query).await;
    if matches.is_empty() {
        println!("No entries match '{}'.", query);
    }
    for path in matches {
        println!("{}", path);
    }
    Ok(())
}

/// Print an entry or copy its password.
async fn cmd_show(deck: &PassDeck, raw: &str, clip: bool) -> Result<()> {
    let path = parse_path(raw)?;

    if clip {
        deck.copy_entry_password(&path)
            .await
            .with_context(|| format!("Failed to copy {}", path))?;
        return hold_clipboard(deck, &path.to_string()).await;
    }

    let secret = deck
        .open_entry(&path)
        .await
        .with_context(|| format!("Failed to open {}", path))?;
    let text = secret
        .value()
        .as_str()
        .context("Entry is not text")?;
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Insert a new entry.
async fn cmd_insert(deck: &PassDeck, raw: &str, notes: Option<String>) -> Result<()> {
    let path = parse_path(raw)?;
    let password = prompt_new_password(&path)?;
    let content = EntryContent::compose(password.as_str(), notes.unwrap_or_default())?;

    deck.create(&path, &content)
        .await
        .with_context(|| format!("Failed to insert {}", path))?;

    println!("Inserted {}", path);
    Ok(())
}

/// Change an entry's password.
async fn cmd_edit(deck: &PassDeck, raw: &str) -> Result<()> {
    let path = parse_path(raw)?;
    if !deck.is_leaf(&path).await {
        anyhow::bail!("{} is not in the password store", path);
    }

    let password = prompt_new_password(&path)?;
    deck.change_password(&path, &password)
        .await
        .with_context(|| format!("Failed to update {}", path))?;

    println!("Updated {}", path);
    Ok(())
}

/// Generate a password, optionally storing it.
async fn cmd_generate(
    deck: &PassDeck,
    raw: Option<&str>,
    length: Option<usize>,
    policy: Option<CharsetPolicy>,
    clip: bool,
) -> Result<()> {
    let length = length.unwrap_or(deck.settings().password_length);
    let policy = policy.unwrap_or_else(|| deck.settings().charset.clone());
    let secret = deck
        .generate_secret_with(length, &policy)
        .context("Failed to generate password")?;

    if let Some(raw) = raw {
        let path = parse_path(raw)?;
        let content = EntryContent::compose(secret.value().as_str()?, "")?;
        deck.create(&path, &content)
            .await
            .with_context(|| format!("Failed to store {}", path))?;
        println!("Stored generated password in {}", path);

        if clip {
            let stored = PendingSecret::from_entry(path.clone(), secret.value().clone());
            deck.copy_to_clipboard(&stored)?;
            return hold_clipboard(deck, &path.to_string()).await;
        }
    } else if clip {
        deck.copy_to_clipboard(&secret)?;
        return hold_clipboard(deck, "generated password").await;
    }

    println!("{}", secret.value().as_str()?);
    Ok(())
}

/// Rename an entry.
async fn cmd_mv(deck: &PassDeck, old: &str, new: &str, force: bool) -> Result<()> {
    let old = parse_path(old)?;
    let new = parse_path(new)?;

    let overwrite = if deck.contains(&new).await {
        if force || confirm(&format!("{} exists. Overwrite it?", new))? {
            Some(Confirmation::overwrite(&new))
        } else {
            anyhow::bail!("Not overwriting {}", new);
        }
    } else {
        None
    };

    deck.rename(&old, &new, overwrite.as_ref())
        .await
        .with_context(|| format!("Failed to move {} to {}", old, new))?;

    println!("Moved {} to {}", old, new);
    Ok(())
}

/// Remove an entry or directory.
async fn cmd_rm(deck: &PassDeck, raw: &str, yes: bool) -> Result<()> {
    let path = parse_path(raw)?;
    if !deck.contains(&path).await {
        anyhow::bail!("{} is not in the password store", path);
    }

    let question = if deck.is_leaf(&path).await {
        format!("Remove {}?", path)
    } else {
        format!("Remove {} and everything in it?", path)
    };
    if !yes && !confirm(&question)? {
        println!("Nothing removed.");
        return Ok(());
    }

    deck.delete(&path, Some(&Confirmation::delete(&path)))
        .await
        .with_context(|| format!("Failed to remove {}", path))?;

    println!("Removed {}", path);
    Ok(())
}

/// Print or save the effective settings.
fn cmd_config(settings: &Settings, path: Option<PathBuf>, save: bool) -> Result<()> {
    let json = String::from_utf8(settings.to_bytes()?).context("Settings are not UTF-8")?;
    println!("{}", json);

    if save {
        let path = path.context("No config directory on this platform; pass --config")?;
        settings
            .save(&path)
            .with_context(|| format!("Failed to save settings to {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

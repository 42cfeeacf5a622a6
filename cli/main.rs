use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{ArgGroup, Parser, Subcommand};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use notevault::backend::StorageHandle;
use notevault::gate::PasswordSource;
use notevault::{config, store, NoteStore, VaultError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// NoteVault - personal notes in a key-value store or a directory, optionally encrypted
#[derive(Parser)]
#[command(name = "notevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "notevault.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a configuration file and create the default notes
    Init {
        /// Key-value store file path
        #[arg(long, default_value = "./notevault.kv.json")]
        kv_path: String,

        /// Storage pointer file path
        #[arg(long, default_value = "./notevault.state.json")]
        state_path: String,
    },

    /// List notes
    List {
        /// Show encryption flags and system notes
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a note
    Show {
        name: String,
    },

    /// Save a note from a file or stdin, creating it if needed
    Write {
        name: String,

        /// Read content from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Create an empty note (a new scratch-N note if no name is given)
    New {
        name: Option<String>,
    },

    /// Rename a note
    Rename {
        old: String,
        new: String,
    },

    /// Delete a note
    Remove {
        name: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Move all notes to a directory or back to the key-value store
    #[command(group(ArgGroup::new("target").required(true).args(["dir", "kv"])))]
    Migrate {
        /// Directory to move notes into
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Move notes back into the key-value store
        #[arg(long)]
        kv: bool,
    },

    /// Switch to another directory without moving notes
    UseDir {
        dir: PathBuf,
    },

    /// Encrypt every note with a password
    EncryptAll,

    /// Decrypt every note and forget the password
    DecryptAll,

    /// Read every note file in the background to warm synced drives
    Preload,

    /// Show storage status and statistics
    Status,
}

/// Reads passwords from the terminal with echo turned off.
struct TerminalPrompt;

#[async_trait]
impl PasswordSource for TerminalPrompt {
    async fn get_password(&self, message: &str) -> notevault::Result<String> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            Password::new()
                .with_prompt(message)
                .allow_empty_password(true)
                .interact()
                .map_err(|e| {
                    VaultError::PasswordUnavailable(format!("failed to read password: {}", e))
                })
        })
        .await
        .map_err(|e| VaultError::PasswordUnavailable(e.to_string()))?
    }
}

/// Ask for a new password twice.
async fn prompt_new_password() -> Result<String> {
    tokio::task::spawn_blocking(|| {
        Password::new()
            .with_prompt("New password for encrypting notes")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
    })
    .await?
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=notevault=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "notevault starting");

    match cli.command {
        Commands::Init {
            kv_path,
            state_path,
        } => cmd_init(&cli.config, &kv_path, &state_path).await,
        Commands::List { verbose } => cmd_list(&cli.config, verbose).await,
        Commands::Show { name } => cmd_show(&cli.config, &name).await,
        Commands::Write { name, file } => cmd_write(&cli.config, &name, file.as_ref()).await,
        Commands::New { name } => cmd_new(&cli.config, name.as_deref()).await,
        Commands::Rename { old, new } => cmd_rename(&cli.config, &old, &new).await,
        Commands::Remove { name, yes } => cmd_remove(&cli.config, &name, yes).await,
        Commands::Migrate { dir, kv: _ } => cmd_migrate(&cli.config, dir).await,
        Commands::UseDir { dir } => cmd_use_dir(&cli.config, dir).await,
        Commands::EncryptAll => cmd_encrypt_all(&cli.config).await,
        Commands::DecryptAll => cmd_decrypt_all(&cli.config).await,
        Commands::Preload => cmd_preload(&cli.config).await,
        Commands::Status => cmd_status(&cli.config).await,
    }
}

/// Create a spinner for operations touching every note
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

async fn open_store(config_path: &str) -> Result<NoteStore> {
    let cfg = config::Config::load_with_env(Some(config_path))?;
    let store = NoteStore::open(&cfg.kv_path, &cfg.state_path, Arc::new(TerminalPrompt))
        .await
        .context("opening note store")?;
    Ok(store)
}

async fn cmd_init(config_path: &str, kv_path: &str, state_path: &str) -> Result<()> {
    let cfg = config::Config::new(kv_path, state_path);
    cfg.validate()?;

    if fs::try_exists(config_path).await.unwrap_or(false) {
        anyhow::bail!(
            "Configuration file '{}' already exists. Remove it first or use a different path.",
            config_path
        );
    }

    let config_json = serde_json::to_string_pretty(&cfg)?;
    fs::write(config_path, config_json)
        .await
        .with_context(|| format!("writing config to '{}'", config_path))?;

    let store = open_store(config_path).await?;

    println!("Initialization complete!");
    println!("Config:     {}", config_path);
    println!("Key-value:  {}", cfg.kv_path);
    println!("Pointer:    {}", cfg.state_path);
    println!("Notes:      {}", store.note_count());
    Ok(())
}

async fn cmd_list(config_path: &str, verbose: bool) -> Result<()> {
    let store = open_store(config_path).await?;
    let names = store.names();

    if verbose {
        println!("Notes in {} ({} total):", store.backend_kind().await, names.len());
        println!();
        println!("{:<40} {:>10}", "NAME", "ENCRYPTED");
        println!("{}", "-".repeat(51));
        for name in &names {
            let encrypted = if store.is_encrypted(name) { "yes" } else { "no" };
            println!("{:<40} {:>10}", name, encrypted);
        }
        println!();
        println!("System notes:");
        for note in notevault::system_notes::SystemNote::ALL {
            println!("  {}", note.name());
        }
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(())
}

async fn cmd_show(config_path: &str, name: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    match store.load_note_if_exists(name).await? {
        Some(content) => {
            io::stdout().write_all(content.as_bytes())?;
            Ok(())
        }
        None => anyhow::bail!("Note '{}' not found", name),
    }
}

async fn cmd_write(config_path: &str, name: &str, file: Option<&PathBuf>) -> Result<()> {
    let name = store::sanitize_note_name(name);
    let content = match file {
        Some(path) => fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {:?}", path))?,
        None => {
            let mut s = String::new();
            tokio::io::stdin().read_to_string(&mut s).await?;
            s
        }
    };

    let store = open_store(config_path).await?;
    store.save_note(&name, &content).await?;
    eprintln!("Saved '{}' ({} bytes)", name, content.len());
    Ok(())
}

async fn cmd_new(config_path: &str, name: Option<&str>) -> Result<()> {
    let store = open_store(config_path).await?;
    let name = match name {
        Some(name) => {
            let name = store::sanitize_note_name(name);
            store.create_note(&name, "").await?;
            name
        }
        None => store.create_new_scratch_note().await?,
    };
    println!("Created '{}'", name);
    Ok(())
}

async fn cmd_rename(config_path: &str, old: &str, new: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    let new = store::sanitize_note_name(new);
    store.rename_note(old, &new).await?;
    println!("Renamed '{}' -> '{}'", old, new);
    Ok(())
}

async fn cmd_remove(config_path: &str, name: &str, yes: bool) -> Result<()> {
    let store = open_store(config_path).await?;

    if !store.can_delete(name) {
        anyhow::bail!("Note '{}' cannot be deleted", name);
    }
    if !store.note_exists(name) {
        anyhow::bail!("Note '{}' not found", name);
    }

    if !yes {
        print!("Delete '{}'? This cannot be undone. [y/N]: ", name);
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_note(name).await?;
    println!("Deleted '{}'", name);
    Ok(())
}

async fn cmd_migrate(config_path: &str, dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(config_path).await?;
    let target = match dir {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating directory {:?}", dir))?;
            StorageHandle::directory(dir)
        }
        None => StorageHandle::key_value(),
    };

    let spinner = create_spinner(&format!("Moving notes to the {}...", target.kind()));
    let report = store.migrate_to(target).await?;
    spinner.finish_with_message(format!(
        "Moved {} notes ({} created, {} identical, {} saved under a new name)",
        report.notes.len(),
        report.created(),
        report.skipped(),
        report.renamed()
    ));

    for note in report.notes.iter().filter(|n| n.target_name != n.logical_name) {
        println!("  {} -> {}", note.logical_name, note.target_name);
    }
    Ok(())
}

async fn cmd_use_dir(config_path: &str, dir: PathBuf) -> Result<()> {
    let store = open_store(config_path).await?;
    let names = store.use_directory(&dir).await?;
    println!("Using {:?} ({} notes)", dir, names.len());
    Ok(())
}

async fn cmd_encrypt_all(config_path: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    let password = prompt_new_password().await?;

    let spinner = create_spinner("Encrypting notes...");
    let n = store.encrypt_all_notes(&password).await?;
    spinner.finish_with_message(format!("Encrypted {} notes", n));
    Ok(())
}

async fn cmd_decrypt_all(config_path: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    let n = store.decrypt_all_notes().await?;
    println!("Decrypted {} notes", n);
    Ok(())
}

async fn cmd_preload(config_path: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    let n = store.preload_all_notes().await?;
    println!("Started reading {} notes", n);
    Ok(())
}

async fn cmd_status(config_path: &str) -> Result<()> {
    let cfg = config::Config::load_with_env(Some(config_path))?;
    let store = open_store(config_path).await?;
    let handle = store.handle().await;

    println!("NoteVault Status");
    println!();
    println!("Configuration:");
    println!("  Config file:   {}", config_path);
    println!("  Key-value:     {}", cfg.kv_path);
    println!("  Pointer:       {}", cfg.state_path);
    println!();
    println!("Storage:         {}", handle.kind());
    if let Some(dir) = &handle.dir {
        println!("  Directory:     {}", dir.display());
    }
    println!();
    println!("Notes:           {}", store.note_count());
    println!("  Encrypted:     {}", store.encrypted_names().len());
    println!(
        "  Encryption:    {}",
        if store.is_using_encryption().await { "on" } else { "off" }
    );

    let stats = store.stats();
    if stats.created > 0 {
        println!();
        println!("Created {} default note(s) on open", stats.created);
    }
    Ok(())
}

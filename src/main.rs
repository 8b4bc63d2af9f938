//! ronmgr - Ready or Not mod manager for Linux
//!
//! Command-line front-end over the `ron_modmgr` library.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ron_modmgr::app::ModManager;
use ron_modmgr::data_path;
use ron_modmgr::logging::{init_logger, log_error, log_info, set_console_echo};
use ron_modmgr::models::Instance;
use ron_modmgr::steam;
use ron_modmgr::store::DataStore;

#[derive(Parser)]
#[command(name = "ronmgr", version, about = "Instance-based mod manager for Ready or Not")]
struct Cli {
    /// Data directory (defaults to $RONMGR_DATA_DIR or ~/.ron-modmgr)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Echo log lines to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the game directory, the active instance and current links
    Status,
    /// List the packages in the mod library
    Library,
    /// List instances
    List,
    /// Create an empty instance
    Create { name: String },
    /// Delete an instance (must not be active)
    Delete { name: String },
    /// Show the mods of an instance
    Show { name: String },
    /// Import .pak files or archives (.zip, .7z, .rar) into an instance
    Add {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove mods from an instance by filename
    Remove {
        name: String,
        #[arg(required = true)]
        filenames: Vec<String>,
    },
    /// Enable a mod in an instance
    Enable { name: String, filename: String },
    /// Disable a mod in an instance
    Disable { name: String, filename: String },
    /// Add every library mod the instance does not have yet
    Scan { name: String },
    /// Link an instance's enabled mods into the game
    Activate { name: String },
    /// Remove all managed links from the game
    Deactivate,
    /// List mods whose package file is missing
    Verify { name: String },
    /// Show conflict warnings for an instance
    Conflicts { name: String },
    /// Launch the game through Steam
    Launch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    set_console_echo(cli.verbose);

    let root = cli.data_dir.unwrap_or_else(|| data_path!().to_path_buf());
    let store = DataStore::open(&root)
        .with_context(|| format!("Cannot open data directory {}", root.display()))?;

    init_logger(&store.logs_dir());
    log_info(&format!("ronmgr {} starting", env!("CARGO_PKG_VERSION")));

    let result = run(cli.command, store);
    if let Err(e) = &result {
        log_error(&format!("{:#}", e));
    }
    result
}

fn run(command: Command, store: DataStore) -> Result<()> {
    let mut manager = ModManager::open(store);

    match command {
        Command::Status => print_status(&manager),
        Command::Library => {
            let mods = manager.library_mods();
            if mods.is_empty() {
                println!(
                    "No mods found in the library.\nAdd .pak files to: {}",
                    manager.store().mods_dir().display()
                );
            }
            for entry in mods {
                println!("{:<40} {:>12}", entry.filename, format_size(entry.size));
            }
        }
        Command::List => {
            for name in manager.list_instances() {
                let marker = if manager.state().is_active(&name) { " (active)" } else { "" };
                println!("{}{}", name, marker);
            }
        }
        Command::Create { name } => {
            manager.create_instance(&name)?;
            println!("Created instance: {}", name);
        }
        Command::Delete { name } => {
            manager.delete_instance(&name)?;
            println!("Deleted instance: {}", name);
        }
        Command::Show { name } => {
            let instance = manager.load_instance(&name)?;
            print_instance(&instance);
            warn_about(&manager, &name)?;
        }
        Command::Add { name, files } => {
            let report = manager.add_files(&name, &files)?;
            for filename in &report.added {
                println!("Added: {}", filename);
            }
            for filename in &report.already_present {
                println!("Mod already in instance: {}", filename);
            }
            for failure in &report.failures {
                eprintln!("Failed: {}: {}", failure.source.display(), failure.error);
            }
            println!("Added {} mod(s) to instance '{}'.", report.added.len(), name);
            if !report.failures.is_empty() {
                println!("{} file(s) failed to import.", report.failures.len());
            }
        }
        Command::Remove { name, filenames } => {
            for filename in manager.remove_mods(&name, &filenames)? {
                println!("Removed mod: {}", filename);
            }
        }
        Command::Enable { name, filename } => {
            manager.set_mod_enabled(&name, &filename, true)?;
            println!("Mod '{}' enabled", filename);
        }
        Command::Disable { name, filename } => {
            manager.set_mod_enabled(&name, &filename, false)?;
            println!("Mod '{}' disabled", filename);
        }
        Command::Scan { name } => {
            let (added, skipped) = manager.scan_library(&name)?;
            println!("Added {} mod(s) from library.", added);
            if skipped > 0 {
                println!("Skipped {} mod(s) already in instance.", skipped);
            }
        }
        Command::Activate { name } => {
            require_game_dir(&manager)?;
            warn_about(&manager, &name)?;
            let report = manager.activate_instance(&name)?;
            for error in &report.errors {
                eprintln!("{}", error);
            }
            println!(
                "Instance '{}' activated. {} mod(s) have been symlinked to the game directory.",
                name, report.created
            );
        }
        Command::Deactivate => {
            require_game_dir(&manager)?;
            let removed = manager.deactivate()?;
            println!("All mods have been deactivated. {} symlink(s) removed.", removed);
        }
        Command::Verify { name } => {
            let missing = manager.verify_instance(&name)?;
            if missing.is_empty() {
                println!("All mods in '{}' are present.", name);
            } else {
                println!("{} missing mod(s) in instance '{}':", missing.len(), name);
                for filename in missing {
                    println!("  {}", filename);
                }
            }
        }
        Command::Conflicts { name } => {
            let conflicts = manager.instance_conflicts(&name)?;
            if conflicts.is_empty() {
                println!("No conflicts detected.");
            }
            for conflict in conflicts {
                println!("Warning: {}", conflict);
            }
        }
        Command::Launch => {
            steam::launch_game().context("Failed to start Steam")?;
            println!("Launching Ready or Not through Steam...");
        }
    }

    Ok(())
}

fn require_game_dir(manager: &ModManager) -> Result<()> {
    if let Err(e) = manager.resolution() {
        bail!("{}\n{}", e, e.hint());
    }
    Ok(())
}

fn warn_about(manager: &ModManager, name: &str) -> Result<()> {
    let missing = manager.verify_instance(name)?;
    if !missing.is_empty() {
        eprintln!("Warning: {} missing mod(s) in instance '{}'", missing.len(), name);
    }
    for conflict in manager.instance_conflicts(name)? {
        eprintln!("Warning: {}", conflict);
    }
    Ok(())
}

fn print_status(manager: &ModManager) {
    match manager.resolution() {
        Ok(paths) => println!("Game directory: {}", paths.mods_dir.display()),
        Err(e) => println!("Game directory: not found\n  {}\n  {}", e, e.hint().replace('\n', "\n  ")),
    }
    println!("Data directory: {}", manager.store().root().display());
    println!(
        "Active instance: {}",
        manager.active_instance().unwrap_or("(none)")
    );

    let links = manager.managed_links();
    if !links.is_empty() {
        println!("Managed links:");
        for link in links {
            println!("  {} -> {}", link.name, link.target.display());
        }
    }
}

fn print_instance(instance: &Instance) {
    println!("{} (created {})", instance.name, instance.created);
    for entry in &instance.mods {
        let mark = if entry.enabled { "x" } else { " " };
        let missing = if entry.source_exists() { "" } else { "  [missing]" };
        println!(
            "  [{}] {:<40} {:>12}{}",
            mark,
            entry.filename,
            format_size(entry.size),
            missing
        );
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

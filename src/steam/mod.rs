//! Steam integration module
//!
//! Library discovery, resolution of the game's Proton mod directory, and the
//! Steam launch invocation.

mod paths;
mod resolver;

pub use paths::{find_library_roots, parse_library_paths, steam_root_of, STEAM_INSTALL_PATHS};
pub use resolver::{
    probe_library, resolve_in_roots, GameLocator, GamePaths, PrefixLayout, Probe, ResolveError,
};

use crate::game::STEAM_APP_ID;

/// Command line that launches the game through Steam
pub fn launch_command() -> Vec<String> {
    vec![
        "steam".to_string(),
        format!("steam://rungameid/{}", STEAM_APP_ID),
    ]
}

/// Launch the game through Steam without waiting for it
pub fn launch_game() -> std::io::Result<()> {
    use std::process::{Command, Stdio};

    let command = launch_command();
    Command::new(&command[0])
        .args(&command[1..])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(())
}

//! ron_modmgr - Ready or Not mod manager for Linux
//!
//! Library crate for the mod manager core: game path resolution, the mod
//! library and instances, archive import and symlink activation.
//! Front-ends (the `ronmgr` CLI, or a GUI) drive it through [`app::ModManager`].

pub mod paths;

pub mod activation;
pub mod app;
pub mod game;
pub mod importer;
pub mod logging;
pub mod models;
pub mod steam;
pub mod store;

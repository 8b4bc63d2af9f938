//! Session logging
//!
//! Leveled, timestamped log lines. Until [`init_logger`] opens a log file the
//! lines only go to stderr, so embedding the library never writes into `$HOME`
//! behind the caller's back.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

static LOGGER: OnceLock<Mutex<ModLogger>> = OnceLock::new();

// ============================================================================
// System Information Detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub app_version: String,
    pub distro: String,
    pub kernel: String,
    pub session_type: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            distro: detect_distro(),
            kernel: detect_kernel(),
            session_type: std::env::var("XDG_SESSION_TYPE")
                .unwrap_or_else(|_| "Unknown".to_string()),
        }
    }

    pub fn to_log_header(&self) -> String {
        format!(
r#"================================================================================
Ready or Not Mod Manager Log - {}
================================================================================
Application:   ronmgr v{}
System Info:
  Distro:      {}
  Kernel:      {}
  Session:     {}
================================================================================
"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.distro,
            self.kernel,
            self.session_type,
        )
    }
}

fn detect_distro() -> String {
    if let Ok(file) = File::open("/etc/os-release") {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                return name.trim_matches('"').to_string();
            }
        }
    }
    "Unknown".to_string()
}

fn detect_kernel() -> String {
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Action, // user-initiated operations
    Import,
    Link,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Action => "[ACTION]",
            LogLevel::Import => "[IMPORT]",
            LogLevel::Link => "[LINK]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

pub struct ModLogger {
    log_file: Option<File>,
    log_path: Option<PathBuf>,
    echo: bool,
}

impl ModLogger {
    fn console_only() -> Self {
        Self {
            log_file: None,
            log_path: None,
            echo: true,
        }
    }

    fn open_file(&mut self, log_dir: &Path) {
        if fs::create_dir_all(log_dir).is_err() {
            return;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("ronmgr_{}.log", timestamp));

        self.log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        if self.log_file.is_some() {
            self.log_path = Some(log_path);
            let header = SystemInfo::detect().to_log_header();
            self.write_file(&header);
        }
    }

    fn write_file(&mut self, msg: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        self.write_file(&formatted);

        if self.echo {
            eprintln!("{}", formatted);
        }
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

fn logger() -> &'static Mutex<ModLogger> {
    LOGGER.get_or_init(|| Mutex::new(ModLogger::console_only()))
}

/// Start writing the session log into `log_dir` (call once at startup).
///
/// Returns the path of the opened log file, if one could be created.
pub fn init_logger(log_dir: &Path) -> Option<PathBuf> {
    let mut log = logger().lock();
    if log.log_file.is_none() {
        log.open_file(log_dir);
    }
    log.log_path.clone()
}

/// Toggle mirroring of log lines to stderr.
pub fn set_console_echo(enabled: bool) {
    logger().lock().echo = enabled;
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log_info(message: &str) {
    logger().lock().log(LogLevel::Info, message);
}

pub fn log_action(message: &str) {
    logger().lock().log(LogLevel::Action, message);
}

pub fn log_import(message: &str) {
    logger().lock().log(LogLevel::Import, message);
}

pub fn log_link(message: &str) {
    logger().lock().log(LogLevel::Link, message);
}

pub fn log_warning(message: &str) {
    logger().lock().log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    logger().lock().log(LogLevel::Error, message);
}

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use overlay_kit_core::paths;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};

/// Logs to stderr so frames printed on stdout stay readable, with a plain
/// copy in the log file.
pub struct ShellLogger {
    max_level: Level,
    log_file: Mutex<Option<File>>,
    target_colors: Mutex<HashMap<String, usize>>,
    next_color_index: AtomicUsize,
}

impl ShellLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let log_file = paths::log_file_path().and_then(|path| {
            match OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
            {
                Ok(file) => Some(file),
                Err(e) => {
                    eprintln!("Warning: Failed to open log file at {:?}: {}", path, e);
                    None
                }
            }
        });

        Self {
            max_level: max_level(quiet, verbose),
            log_file: Mutex::new(log_file),
            target_colors: Mutex::new(HashMap::new()),
            next_color_index: AtomicUsize::new(0),
        }
    }

    fn color_for_target(&self, target: &str) -> String {
        let colors: &[fn(&str) -> ColoredString] = &[
            |s| s.green(),
            |s| s.yellow(),
            |s| s.blue(),
            |s| s.magenta(),
            |s| s.cyan(),
            |s| s.purple(),
        ];

        let color_index = *self
            .target_colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target.to_string())
            .or_insert_with(|| {
                let index = self.next_color_index.fetch_add(1, Ordering::SeqCst);
                index % colors.len()
            });

        colors[color_index](target).to_string()
    }

    fn format_log(&self, record: &Record) -> String {
        let level_str = level_tag(record.level());

        let target = match short_target(record) {
            Some(short) => format!("[{}]", self.color_for_target(short).dimmed()),
            None => String::new(),
        };

        let message = join_parts(level_str, &target, record);

        match record.level() {
            Level::Error => message.red().bold().to_string(),
            Level::Warn => message.yellow().bold().to_string(),
            level => {
                let colored_level = match level {
                    Level::Info => level_str.green().bold(),
                    Level::Debug => level_str.blue().bold(),
                    _ => level_str.white().bold(),
                };
                message.replacen(level_str, &colored_level.to_string(), 1)
            }
        }
    }

    fn format_log_plain(&self, record: &Record) -> String {
        let target = short_target(record)
            .map(|short| format!("[{}]", short))
            .unwrap_or_default();
        join_parts(level_tag(record.level()), &target, record)
    }
}

fn max_level(quiet: bool, verbose: bool) -> Level {
    if quiet {
        Level::Warn
    } else if verbose {
        Level::Trace
    } else {
        Level::Info
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

fn short_target<'a>(record: &Record<'a>) -> Option<&'a str> {
    let target = record.target();
    if target.is_empty() {
        return None;
    }
    target.split("::").last()
}

fn join_parts(level_str: &str, target: &str, record: &Record) -> String {
    format!(
        "{} {}{} {}",
        level_str,
        target,
        if !target.is_empty() { " " } else { "" },
        record.args()
    )
}

impl Log for ShellLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!("{}", self.format_log(record));

        let plain_message = self.format_log_plain(record);
        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(file) = file_opt.as_mut() {
                let _ = writeln!(file, "{}", plain_message);
                let _ = file.flush();
            }
        }
    }

    fn flush(&self) {}
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    let logger = ShellLogger::new(quiet, verbose);
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod compositor;
pub mod config;
pub mod document;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod keywords;
pub mod media;
pub mod narration;

/// Receives every progress line as `[TAG] message`.
pub type ProgressHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static PROGRESS_HOOK: Lazy<Mutex<Option<ProgressHook>>> = Lazy::new(|| Mutex::new(None));

/// Installs a process-wide progress sink, or clears it with `None`.
pub fn set_progress_hook(hook: Option<ProgressHook>) {
    if let Ok(mut slot) = PROGRESS_HOOK.lock() {
        *slot = hook;
    }
}

#[derive(Debug, Clone, Copy)]
enum LogLevel {
    Info,
    Ok,
    Warn,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Ok => "OK",
            LogLevel::Warn => "WARN",
        }
    }
}

fn emit(level: LogLevel, message: &str) {
    match level {
        LogLevel::Warn => tracing::warn!(target: "narrated_shorts", "{message}"),
        LogLevel::Info | LogLevel::Ok => {
            tracing::info!(target: "narrated_shorts", status = level.tag(), "{message}")
        }
    }

    let hook = match PROGRESS_HOOK.lock() {
        Ok(slot) => slot.clone(),
        Err(_) => None,
    };
    if let Some(hook) = hook {
        if let Ok(callback) = hook.lock() {
            callback(&format!("[{}] {}", level.tag(), message));
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    emit(LogLevel::Info, message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    emit(LogLevel::Ok, message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    emit(LogLevel::Warn, message.as_ref());
}

/// Last `max` characters of `text`, for quoting tool output in errors.
pub(crate) fn tail_chars(text: &str, max: usize) -> String {
    let skip = text.chars().count().saturating_sub(max);
    text.chars().skip(skip).collect()
}

pub mod init;

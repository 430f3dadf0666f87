// Logging Setup
// Console logging on stderr plus one log file per run, with old run logs pruned

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

static PROCESS_START: OnceLock<Instant> = OnceLock::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "detectAI_";
const LOGS_KEEP: usize = 30;

const DISABLE_FILE_LOG_ENV: &str = "DETECTAI_DISABLE_FILE_LOG";
const DISABLE_CLEANUP_ENV: &str = "DETECTAI_DISABLE_LOG_CLEANUP";
const LOG_DIR_ENV: &str = "DETECTAI_LOG_DIR";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// `None` means console only.
    pub file_dir: Option<PathBuf>,
    pub prune_old_logs: bool,
    pub keep: usize,
}

fn is_set(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true") | Some("TRUE"))
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Build settings from a variable lookup.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let file_dir = if is_set(lookup(DISABLE_FILE_LOG_ENV)) {
            None
        } else {
            Some(match lookup(LOG_DIR_ENV) {
                Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
                _ => default_logs_dir(),
            })
        };
        Self {
            file_dir,
            prune_old_logs: !is_set(lookup(DISABLE_CLEANUP_ENV)),
            keep: LOGS_KEEP,
        }
    }
}

fn default_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("detectAI").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

pub fn startup_elapsed_ms() -> u128 {
    PROCESS_START
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

// stderr keeps log lines out of the interactive prompts on stdout
fn console_layer() -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true)
        .boxed()
}

/// Open `dir/detectAI_<timestamp>.log`; returns the layer and the file name.
fn run_file_layer(dir: &Path) -> std::io::Result<(BoxedLayer, String)> {
    fs::create_dir_all(dir)?;
    let name = format!("{}{}.log", LOG_PREFIX, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, &name));
    let _ = LOG_GUARD.set(guard);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .boxed();
    Ok((layer, name))
}

/// Install the global subscriber according to the environment.
pub fn init_logging() {
    init_with(LogSettings::from_env());
}

pub fn init_with(settings: LogSettings) {
    PROCESS_START.get_or_init(Instant::now);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = vec![console_layer()];
    let mut log_file = None;
    let mut dir_error = None;
    if let Some(dir) = &settings.file_dir {
        match run_file_layer(dir) {
            Ok((layer, name)) => {
                layers.push(layer);
                log_file = Some(dir.join(name));
            }
            Err(e) => dir_error = Some(e),
        }
    }

    if let Err(e) = tracing_subscriber::registry().with(layers).with(env_filter).try_init() {
        eprintln!("Logging already initialized: {}", e);
        return;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "=== detectAI Started ===");
    match (&log_file, dir_error) {
        (Some(path), _) => info!(path = %path.display(), "logging.file"),
        (None, Some(e)) => warn!(error = %e, "logging.console_only: log dir not writable"),
        (None, None) => info!("logging.console_only"),
    }

    if let (Some(dir), true) = (settings.file_dir, settings.prune_old_logs) {
        let keep = settings.keep;
        std::thread::spawn(move || prune_run_logs(&dir, keep));
    }
}

/// Delete the oldest run logs so at most `keep` remain. Returns how many were removed.
pub fn prune_run_logs(dir: &Path, keep: usize) -> usize {
    let Ok(read) = fs::read_dir(dir) else { return 0 };
    // Names embed a sortable timestamp, so name order is age order.
    let mut logs: Vec<PathBuf> = read
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"))
        })
        .collect();
    logs.sort();

    let excess = logs.len().saturating_sub(keep);
    logs.iter()
        .take(excess)
        .filter(|p| fs::remove_file(p).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        LogSettings::resolve(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_settings_defaults() {
        let s = settings(&[]);
        assert_eq!(s.file_dir, Some(default_logs_dir()));
        assert!(s.prune_old_logs);
        assert_eq!(s.keep, LOGS_KEEP);
    }

    #[test]
    fn test_settings_overrides() {
        let s = settings(&[(LOG_DIR_ENV, "/tmp/detectai-logs"), (DISABLE_CLEANUP_ENV, "1")]);
        assert_eq!(s.file_dir, Some(PathBuf::from("/tmp/detectai-logs")));
        assert!(!s.prune_old_logs);

        let s = settings(&[(DISABLE_FILE_LOG_ENV, "true"), (LOG_DIR_ENV, "/tmp/x")]);
        assert_eq!(s.file_dir, None);

        let s = settings(&[(DISABLE_FILE_LOG_ENV, "0"), (LOG_DIR_ENV, "  ")]);
        assert_eq!(s.file_dir, Some(default_logs_dir()));
    }

    #[test]
    fn test_prune_keeps_newest_run_logs() {
        let dir = std::env::temp_dir().join(format!("detectai-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        for i in 1..=5 {
            fs::write(dir.join(format!("{}20260101_00000{}.log", LOG_PREFIX, i)), "x").unwrap();
        }
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        assert_eq!(prune_run_logs(&dir, 3), 2);
        assert!(!dir.join(format!("{}20260101_000001.log", LOG_PREFIX)).exists());
        assert!(!dir.join(format!("{}20260101_000002.log", LOG_PREFIX)).exists());
        assert!(dir.join(format!("{}20260101_000005.log", LOG_PREFIX)).exists());
        assert!(dir.join("notes.txt").exists());
        assert_eq!(prune_run_logs(&dir, 3), 0);

        let _ = fs::remove_dir_all(&dir);
    }
}

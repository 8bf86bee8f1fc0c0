use log::{error, info, LevelFilter};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "BRSTMGen";
const CRASH_LOG_FILE: &str = "crash.log";

/// Initialize Sentry when a DSN is given.
///
/// Events are flushed when the returned guard is dropped, so keep it alive
/// until the run ends. Sentry's panic integration reports panics on its own.
pub fn init_sentry(dsn: Option<&str>, environment: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = match dsn {
        Some(d) if !d.is_empty() => d,
        _ => {
            info!("[SENTRY] No DSN provided - Sentry disabled");
            return None;
        }
    };

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: environment.map(|e| e.to_string().into()),
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    if guard.is_enabled() {
        info!("[SENTRY] Initialized - Environment: {:?}", environment);
        Some(guard)
    } else {
        info!("[SENTRY] Failed to initialize");
        None
    }
}

/// Initialize env_logger. `RUST_LOG` wins over `default_level`.
pub fn init_logger(default_level: LevelFilter) {
    let mut builder = env_logger::Builder::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(default_level);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    let _ = builder.try_init();
}

/// Directory holding the crash log.
pub fn log_directory() -> PathBuf {
    match dirs::data_local_dir() {
        Some(local_data) => local_data.join(APP_DIR_NAME),
        None => PathBuf::from("."),
    }
}

/// Append-only file recording panics and errors that aborted a run.
#[derive(Debug, Clone)]
pub struct CrashLog {
    path: PathBuf,
}

impl CrashLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the crash log in the log directory and route panics into it.
    pub fn install() -> Self {
        let log_dir = log_directory();
        let _ = fs::create_dir_all(&log_dir);
        let crash_log = Self::new(log_dir.join(CRASH_LOG_FILE));

        let hook_log = crash_log.clone();
        std::panic::set_hook(Box::new(move |panic_info| {
            let message = format_panic_message(panic_info);
            if let Err(e) = hook_log.append(&message) {
                error!("[CRASH LOGGER] Failed to write crash log: {}", e);
            }
            error!("\n{}", message);
        }));

        info!("[CRASH LOGGER] Initialized - Log: {:?}", crash_log.path);
        crash_log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an error that aborted the run, locally and in Sentry.
    pub fn record_critical(&self, context: &str, error: &str) {
        sentry::with_scope(
            |scope| {
                scope.set_tag("context", context);
                scope.set_level(Some(sentry::Level::Fatal));
            },
            || {
                sentry::capture_message(&format!("{}: {}", context, error), sentry::Level::Fatal);
            },
        );

        let message = format_critical_error(context, error);
        if let Err(e) = self.append(&message) {
            error!("[CRASH LOGGER] Failed to write critical error: {}", e);
        }
        error!("{}", message);
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", message)
    }
}

fn timestamp() -> impl std::fmt::Display {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
}

fn format_panic_message(panic_info: &std::panic::PanicHookInfo) -> String {
    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    };

    let location = panic_info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "Unknown location".to_string());

    format!(
        "===== BRSTMGEN PANIC =====\nTimestamp: {}\nLocation: {}\nMessage: {}\n\nBacktrace:\n{}\n",
        timestamp(),
        location,
        payload,
        std::backtrace::Backtrace::capture()
    )
}

fn format_critical_error(context: &str, error: &str) -> String {
    format!(
        "===== BRSTMGEN ERROR =====\nTimestamp: {}\nContext: {}\nError: {}\n",
        timestamp(),
        context,
        error
    )
}

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dayboard",
    version,
    about = "Two-day agenda renderer for wall panels"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Config file; defaults to $DAYBOARD_CONFIG, then the user config dir.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Render without pushing to the configured display.
    #[arg(long = "no-display")]
    pub no_display: bool,

    /// Render the built-in sample agenda instead of fetching calendars.
    #[arg(long = "demo")]
    pub demo: bool,

    /// Keep running and re-render when the button is pressed.
    #[arg(long = "watch")]
    pub watch: bool,

    /// Print the computed layout as JSON on stdout.
    #[arg(long = "print-layout")]
    pub print_layout: bool,
}

pub fn default_level(verbose: u8, quiet: u8) -> &'static str {
    if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 2 {
        "trace"
    } else if verbose == 1 {
        "debug"
    } else {
        "info"
    }
}

type FileSlot = Option<Box<dyn Layer<Registry> + Send + Sync>>;

/// Keeps the log file writer alive. Drop it last, or buffered lines are lost.
pub struct LogHandle {
    file_slot: reload::Handle<FileSlot, Registry>,
    guard: Option<WorkerGuard>,
}

impl LogHandle {
    /// Starts mirroring every enabled event into `path`, appending.
    pub fn attach_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let Some((dir, file)) = split_log_path(path) else {
            warn!(path = %path.display(), "log path has no file name; file logging disabled");
            return Ok(());
        };

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file)
            .build(dir)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .boxed();

        match self.file_slot.modify(|slot| *slot = Some(layer)) {
            Ok(()) => {
                self.guard = Some(guard);
                debug!(path = %path.display(), "file logging enabled");
            }
            Err(err) => debug!(error = %err, "tracing subscriber not ours; file layer skipped"),
        }
        Ok(())
    }
}

fn build_subscriber(
    env_filter: EnvFilter,
) -> (
    impl tracing::Subscriber + Send + Sync,
    reload::Handle<FileSlot, Registry>,
) {
    let (file_layer, file_slot) = reload::Layer::new(None);
    let subscriber = tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(std::io::stderr().is_terminal()),
        );
    (subscriber, file_slot)
}

/// Installs the stderr subscriber. The log file joins later through
/// [`LogHandle::attach_file`], once the config has named it.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<LogHandle> {
    let level = default_level(verbose, quiet);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let (subscriber, file_slot) = build_subscriber(env_filter);
    if let Err(err) = subscriber.try_init() {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(LogHandle {
        file_slot,
        guard: None,
    })
}

fn split_log_path(path: &Path) -> Option<(PathBuf, String)> {
    let file = path.file_name()?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir.to_path_buf(), file.to_string_lossy().into_owned()))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tracing_subscriber::EnvFilter;

    use super::{GlobalCli, LogHandle, build_subscriber, default_level};

    #[test]
    fn parses_flags() {
        let cli = GlobalCli::parse_from(["dayboard", "--demo", "--no-display", "-vv", "--config", "x.toml"]);
        assert!(cli.demo);
        assert!(cli.no_display);
        assert!(!cli.watch);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("x.toml")));
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_level(0, 0), "info");
        assert_eq!(default_level(1, 0), "debug");
        assert_eq!(default_level(3, 0), "trace");
        assert_eq!(default_level(0, 1), "warn");
        assert_eq!(default_level(2, 2), "error");
    }

    #[test]
    fn log_file_receives_events_only_after_attach() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dayboard.log");
        let (subscriber, file_slot) = build_subscriber(EnvFilter::new("info"));
        let mut handle = LogHandle {
            file_slot,
            guard: None,
        };

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("emitted before the file is known");
            handle.attach_file(&path).expect("attach log file");
            tracing::warn!("emitted after attach");
            tracing::debug!("filtered out by level");
        });
        drop(handle);

        let text = std::fs::read_to_string(&path).expect("log file");
        assert!(text.contains("emitted after attach"), "{text}");
        assert!(!text.contains("emitted before the file is known"), "{text}");
        assert!(!text.contains("filtered out by level"), "{text}");
    }
}

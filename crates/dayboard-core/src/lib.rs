pub mod axis;
pub mod button;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod config;
pub mod datetime;
pub mod day;
pub mod demo;
pub mod display;
pub mod event;
pub mod feed;
pub mod layout;
pub mod normalize;
pub mod pass;
pub mod render;
pub mod report;
pub mod textflow;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  let mut log_handle =
    cli::init_tracing(
      cli.verbose,
      cli.quiet
    )?;

  let cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.ensure_directories()?;
  log_handle
    .attach_file(&cfg.log_path)?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    watch = cli.watch,
    "starting dayboard"
  );
  debug!(
    config = ?cfg.source,
    log = %cfg.log_path.display(),
    cache = %cfg.cache_path.display(),
    "resolved paths"
  );

  let opts = pass::PassOptions {
    demo:         cli.demo,
    print_layout: cli.print_layout
  };
  let mut display = display::select(
    &cfg.display,
    &cfg.cache_path,
    cli.no_display
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(async move {
    if cli.watch {
      let button =
        button::select(&cfg.button);
      pass::watch(
        cfg, display, button, opts
      )
      .await
    } else {
      pass::render_once(
        &cfg,
        display.as_mut(),
        opts
      )
      .await
      .map(|_| ())
    }
  })?;

  info!("done");
  Ok(())
}

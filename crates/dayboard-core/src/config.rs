use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::axis::HourWindow;
use crate::color::Color;
use crate::datetime::parse_timezone;

const CONFIG_ENV_VAR: &str =
  "DAYBOARD_CONFIG";
const APP_DIR_NAME: &str = "dayboard";
const CONFIG_FILE_NAME: &str =
  "config.toml";
const EXAMPLE_CONFIG_NAME: &str =
  "dayboard.example.toml";

fn default_timezone() -> String {
  "UTC".to_string()
}

fn default_background_color() -> String
{
  "white".to_string()
}

fn default_grid_color() -> String {
  "lightgray".to_string()
}

fn default_text_color() -> String {
  "black".to_string()
}

/// Upper bound for every pixel-valued setting.
pub const MAX_PIXELS: u32 = 10_000;

fn default_title_font_size() -> u32 {
  28
}

fn default_body_font_size() -> u32 {
  20
}

fn default_footer_font_size() -> u32 {
  16
}

fn default_hour_start() -> u32 {
  7
}

fn default_hour_end() -> u32 {
  22
}

fn default_column_gap() -> u32 {
  20
}

fn default_margin() -> u32 {
  24
}

fn default_hour_label_width() -> u32 {
  50
}

fn default_all_day_row_height() -> u32
{
  60
}

fn default_min_event_height() -> u32 {
  6
}

fn default_request_timeout() -> u64 {
  15
}

fn default_render_width() -> u32 {
  1600
}

fn default_render_height() -> u32 {
  1200
}

fn default_poll_interval_ms() -> u64 {
  250
}

#[derive(Debug, Deserialize)]
struct RawConfig {
  #[serde(default = "default_timezone")]
  timezone: String,
  #[serde(default)]
  calendars: Vec<RawCalendar>,
  #[serde(
    default = "default_background_color"
  )]
  background_color: String,
  #[serde(default = "default_grid_color")]
  grid_color: String,
  #[serde(default = "default_text_color")]
  text_color: String,
  #[serde(
    default = "default_title_font_size"
  )]
  title_font_size: u32,
  #[serde(
    default = "default_body_font_size"
  )]
  body_font_size: u32,
  #[serde(
    default = "default_footer_font_size"
  )]
  footer_font_size: u32,
  #[serde(default = "default_hour_start")]
  hour_start: u32,
  #[serde(default = "default_hour_end")]
  hour_end: u32,
  #[serde(default = "default_column_gap")]
  column_gap: u32,
  #[serde(default = "default_margin")]
  margin: u32,
  #[serde(
    default = "default_hour_label_width"
  )]
  hour_label_width: u32,
  #[serde(
    default = "default_all_day_row_height"
  )]
  all_day_row_height: u32,
  #[serde(
    default = "default_min_event_height"
  )]
  min_event_height: u32,
  #[serde(
    default = "default_request_timeout"
  )]
  request_timeout: u64,
  cache_path: Option<PathBuf>,
  log_path: Option<PathBuf>,
  #[serde(
    default = "default_render_width"
  )]
  render_width: u32,
  #[serde(
    default = "default_render_height"
  )]
  render_height: u32,
  #[serde(default)]
  display: RawDisplay,
  #[serde(default)]
  button: RawButton
}

#[derive(Debug, Deserialize)]
struct RawCalendar {
  name:  Option<String>,
  url:   Option<String>,
  color: Option<String>
}

#[derive(Debug, Default, Deserialize)]
struct RawDisplay {
  #[serde(default)]
  kind:   DisplayKind,
  path:   Option<PathBuf>,
  width:  Option<u32>,
  height: Option<u32>
}

#[derive(Debug, Deserialize)]
struct RawButton {
  #[serde(default)]
  kind: ButtonKind,
  path: Option<PathBuf>,
  #[serde(
    default = "default_poll_interval_ms"
  )]
  poll_interval_ms: u64
}

impl Default for RawButton {
  fn default() -> Self {
    Self {
      kind:             ButtonKind::default(),
      path:             None,
      poll_interval_ms:
        default_poll_interval_ms()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayKind {
  #[default]
  Png,
  #[serde(alias = "none")]
  Headless
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ButtonKind {
  #[default]
  #[serde(alias = "none")]
  Disabled,
  TriggerFile
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
  pub name:  String,
  pub url:   String,
  pub color: Color
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
  pub kind:   DisplayKind,
  pub path:   Option<PathBuf>,
  pub width:  u32,
  pub height: u32
}

#[derive(Debug, Clone)]
pub struct ButtonConfig {
  pub kind:          ButtonKind,
  pub path:          Option<PathBuf>,
  pub poll_interval: Duration
}

/// Fully validated settings for one process. Built once and handed to each
/// component by reference.
#[derive(Debug, Clone)]
pub struct Config {
  pub source:             Option<PathBuf>,
  pub timezone:           Tz,
  pub calendars:          Vec<CalendarConfig>,
  pub background_color:   Color,
  pub grid_color:         Color,
  pub text_color:         Color,
  pub title_font_size:    u32,
  pub body_font_size:     u32,
  pub footer_font_size:   u32,
  pub hour_start:         u32,
  pub hour_end:           u32,
  pub column_gap:         u32,
  pub margin:             u32,
  pub hour_label_width:   u32,
  pub all_day_row_height: u32,
  pub min_event_height:   u32,
  pub request_timeout:    Duration,
  pub cache_path:         PathBuf,
  pub log_path:           PathBuf,
  pub render_width:       u32,
  pub render_height:      u32,
  pub display:            DisplayConfig,
  pub button:             ButtonConfig
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    )?;
    if !path.is_file() {
      return Err(anyhow!(
        "config not found at {}; copy \
         {EXAMPLE_CONFIG_NAME} there and \
         edit it",
        path.display()
      ));
    }

    info!(config = %path.display(), "loading config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    Self::from_toml_str(
      &text,
      Some(&path)
    )
  }

  pub fn from_toml_str(
    text: &str,
    source: Option<&Path>
  ) -> anyhow::Result<Self> {
    let label = source
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| {
        "<inline>".to_string()
      });
    let raw =
      toml::from_str::<RawConfig>(text)
        .with_context(|| {
          format!(
            "failed to parse TOML \
             {label}"
          )
        })?;

    let mut cfg =
      Self::from_raw(raw, &label)?;
    cfg.source =
      source.map(Path::to_path_buf);
    cfg.sanitize();
    cfg.validate()?;
    Ok(cfg)
  }

  fn from_raw(
    raw: RawConfig,
    label: &str
  ) -> anyhow::Result<Self> {
    let timezone = parse_timezone(
      &raw.timezone,
      &format!("config:{label}")
    )?;

    let mut calendars = Vec::new();
    for (index, entry) in
      raw.calendars.into_iter().enumerate()
    {
      let position = index + 1;
      let (Some(name), Some(url)) = (
        non_blank(entry.name),
        non_blank(entry.url)
      ) else {
        return Err(anyhow!(
          "each calendar entry must \
           include both 'name' and \
           'url'; check entry \
           #{position} in {label}"
        ));
      };
      let Some(color) =
        non_blank(entry.color)
      else {
        return Err(anyhow!(
          "each calendar entry must \
           include a 'color' value (hex \
           or named color); check entry \
           #{position} in {label}"
        ));
      };
      let color = color
        .parse::<Color>()
        .with_context(|| {
          format!(
            "calendar entry #{position} \
             in {label}"
          )
        })?;
      calendars.push(CalendarConfig {
        name,
        url,
        color
      });
    }

    let parse_color =
      |value: &str, key: &str| {
        value.parse::<Color>().with_context(
          || format!("{key} in {label}")
        )
      };

    let display = DisplayConfig {
      kind:   raw.display.kind,
      path:   raw
        .display
        .path
        .map(|p| expand_tilde(&p)),
      width:  raw
        .display
        .width
        .unwrap_or(raw.render_width),
      height: raw
        .display
        .height
        .unwrap_or(raw.render_height)
    };

    let button = ButtonConfig {
      kind:          raw.button.kind,
      path:          raw
        .button
        .path
        .map(|p| expand_tilde(&p)),
      poll_interval:
        Duration::from_millis(
          raw.button.poll_interval_ms
        )
    };

    Ok(Self {
      source: None,
      timezone,
      calendars,
      background_color: parse_color(
        &raw.background_color,
        "background_color"
      )?,
      grid_color: parse_color(
        &raw.grid_color,
        "grid_color"
      )?,
      text_color: parse_color(
        &raw.text_color,
        "text_color"
      )?,
      title_font_size: raw
        .title_font_size,
      body_font_size: raw.body_font_size,
      footer_font_size: raw
        .footer_font_size,
      hour_start: raw.hour_start,
      hour_end: raw.hour_end,
      column_gap: raw.column_gap,
      margin: raw.margin,
      hour_label_width: raw
        .hour_label_width,
      all_day_row_height: raw
        .all_day_row_height,
      min_event_height: raw
        .min_event_height,
      request_timeout:
        Duration::from_secs(
          raw.request_timeout
        ),
      cache_path: raw
        .cache_path
        .map(|p| expand_tilde(&p))
        .unwrap_or_else(
          default_cache_path
        ),
      log_path: raw
        .log_path
        .map(|p| expand_tilde(&p))
        .unwrap_or_else(default_log_path),
      render_width: raw.render_width,
      render_height: raw.render_height,
      display,
      button
    })
  }

  fn sanitize(&mut self) {
    let fields: [(
      &str,
      &mut u32,
      u32
    ); 7] = [
      (
        "title_font_size",
        &mut self.title_font_size,
        default_title_font_size()
      ),
      (
        "body_font_size",
        &mut self.body_font_size,
        default_body_font_size()
      ),
      (
        "footer_font_size",
        &mut self.footer_font_size,
        default_footer_font_size()
      ),
      (
        "render_width",
        &mut self.render_width,
        default_render_width()
      ),
      (
        "render_height",
        &mut self.render_height,
        default_render_height()
      ),
      (
        "display.width",
        &mut self.display.width,
        default_render_width()
      ),
      (
        "display.height",
        &mut self.display.height,
        default_render_height()
      )
    ];

    for (key, value, fallback) in fields
    {
      if *value == 0 {
        warn!(
          key,
          fallback,
          "zero-valued setting; using \
           default"
        );
        *value = fallback;
      }
    }

    if self.request_timeout.is_zero() {
      warn!(
        "request_timeout was zero; \
         using default"
      );
      self.request_timeout =
        Duration::from_secs(
          default_request_timeout()
        );
    }

    if self.button.poll_interval.is_zero()
    {
      self.button.poll_interval =
        Duration::from_millis(
          default_poll_interval_ms()
        );
    }
  }

  fn validate(&self) -> anyhow::Result<()> {
    if self.hour_start >= self.hour_end
      || self.hour_end > 24
    {
      return Err(anyhow!(
        "hour window must satisfy \
         hour_start < hour_end <= 24, \
         got {}..{}",
        self.hour_start,
        self.hour_end
      ));
    }

    let pixel_settings = [
      ("render_width", self.render_width),
      (
        "render_height",
        self.render_height
      ),
      ("display.width", self.display.width),
      (
        "display.height",
        self.display.height
      ),
      ("margin", self.margin),
      ("column_gap", self.column_gap),
      (
        "hour_label_width",
        self.hour_label_width
      ),
      (
        "all_day_row_height",
        self.all_day_row_height
      ),
      (
        "min_event_height",
        self.min_event_height
      ),
      (
        "title_font_size",
        self.title_font_size
      ),
      (
        "body_font_size",
        self.body_font_size
      ),
      (
        "footer_font_size",
        self.footer_font_size
      )
    ];
    for (key, value) in pixel_settings {
      if value > MAX_PIXELS {
        return Err(anyhow!(
          "{key} must be at most \
           {MAX_PIXELS} pixels, got \
           {value}"
        ));
      }
    }

    if self.button.kind
      == ButtonKind::TriggerFile
      && self.button.path.is_none()
    {
      return Err(anyhow!(
        "button.kind = \"trigger-file\" \
         needs button.path"
      ));
    }

    debug!(
      calendars = self.calendars.len(),
      timezone = %self.timezone,
      hour_start = self.hour_start,
      hour_end = self.hour_end,
      "validated config"
    );
    Ok(())
  }

  pub fn hour_window(&self) -> HourWindow {
    HourWindow {
      start_hour: self.hour_start,
      end_hour:   self.hour_end
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn ensure_directories(
    &self
  ) -> anyhow::Result<()> {
    for path in
      [&self.cache_path, &self.log_path]
    {
      let Some(parent) = path.parent()
      else {
        continue;
      };
      if parent.as_os_str().is_empty()
        || parent.exists()
      {
        continue;
      }
      debug!(dir = %parent.display(), "creating directory");
      fs::create_dir_all(parent)
        .with_context(|| {
          format!(
            "failed to create {}",
            parent.display()
          )
        })?;
    }
    Ok(())
  }
}

/// `--config`, then `$DAYBOARD_CONFIG`, then the per-user config dir.
pub fn resolve_config_path(
  config_override: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = config_override {
    return Ok(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Ok(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  let dir =
    dirs::config_dir().ok_or_else(|| {
      anyhow!(
        "cannot determine config \
         directory"
      )
    })?;
  Ok(
    dir
      .join(APP_DIR_NAME)
      .join(CONFIG_FILE_NAME)
  )
}

fn default_cache_path() -> PathBuf {
  dirs::cache_dir()
    .unwrap_or_else(|| {
      PathBuf::from(".")
    })
    .join(APP_DIR_NAME)
    .join("last.png")
}

fn default_log_path() -> PathBuf {
  dirs::state_dir()
    .or_else(dirs::data_local_dir)
    .unwrap_or_else(|| {
      PathBuf::from(".")
    })
    .join(APP_DIR_NAME)
    .join("logs")
    .join("dayboard.log")
}

fn non_blank(
  value: Option<String>
) -> Option<String> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{DisplayConfig, DisplayKind};

/// A panel the rendered page is pushed to.
///
/// `set_image` stages a frame sized to the panel; `show` makes it visible.
pub trait Display: Send {
    fn name(&self) -> &'static str;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn set_image(&mut self, image: &RgbImage) -> anyhow::Result<()>;
    fn show(&mut self) -> anyhow::Result<()>;
}

/// Writes each shown frame to a PNG file, for panels driven by another
/// process or for previewing.
#[derive(Debug)]
pub struct PngDisplay {
    path: PathBuf,
    width: u32,
    height: u32,
    staged: Option<RgbImage>,
}

impl PngDisplay {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            staged: None,
        }
    }
}

impl Display for PngDisplay {
    fn name(&self) -> &'static str {
        "png"
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_image(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        let frame = if image.dimensions() == (self.width, self.height) {
            image.clone()
        } else {
            debug!(
                from_width = image.width(),
                from_height = image.height(),
                to_width = self.width,
                to_height = self.height,
                "resizing frame for display"
            );
            imageops::resize(image, self.width, self.height, FilterType::Lanczos3)
        };
        self.staged = Some(frame);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    fn show(&mut self) -> anyhow::Result<()> {
        let frame = self
            .staged
            .as_ref()
            .ok_or_else(|| anyhow!("show called before set_image"))?;
        save_png_atomic(&self.path, frame)?;
        info!("display updated");
        Ok(())
    }
}

/// Accepts frames and discards them.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessDisplay {
    width: u32,
    height: u32,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Display for HeadlessDisplay {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_image(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        debug!(
            width = image.width(),
            height = image.height(),
            "headless display received frame"
        );
        Ok(())
    }

    fn show(&mut self) -> anyhow::Result<()> {
        debug!("headless display; nothing to show");
        Ok(())
    }
}

/// Picks the display for this run. A PNG display without a path writes
/// `display.png` next to the cache file.
pub fn select(cfg: &DisplayConfig, cache_path: &Path, no_display: bool) -> Box<dyn Display> {
    if no_display || cfg.kind == DisplayKind::Headless {
        info!(forced = no_display, "using headless display");
        return Box::new(HeadlessDisplay::new(cfg.width, cfg.height));
    }

    let path = cfg
        .path
        .clone()
        .unwrap_or_else(|| cache_path.with_file_name("display.png"));
    info!(path = %path.display(), width = cfg.width, height = cfg.height, "using png display");
    Box::new(PngDisplay::new(path, cfg.width, cfg.height))
}

/// Encodes `image` as PNG next to `path` and renames it into place.
#[tracing::instrument(skip(image))]
pub fn save_png_atomic(path: &Path, image: &RgbImage) -> anyhow::Result<()> {
    debug!(file = %path.display(), width = image.width(), height = image.height(), "saving png atomically");

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    image
        .write_to(&mut temp, ImageFormat::Png)
        .with_context(|| format!("failed to encode png for {}", path.display()))?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

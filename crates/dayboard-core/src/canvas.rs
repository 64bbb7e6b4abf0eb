use std::convert::Infallible;

use embedded_graphics::Pixel;
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{OriginDimensions, Point, Size};
use embedded_graphics::mono_font::MonoFont;
use embedded_graphics::mono_font::ascii::{
    FONT_4X6, FONT_5X7, FONT_5X8, FONT_6X9, FONT_6X10, FONT_6X12, FONT_6X13, FONT_7X13, FONT_7X14,
    FONT_8X13, FONT_9X15, FONT_9X18, FONT_10X20,
};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use image::{Rgb, RgbImage};
use unicode_width::UnicodeWidthStr;

use crate::color::Color;
use crate::textflow::TextMeasure;

impl From<Color> for Rgb888 {
    fn from(color: Color) -> Self {
        Rgb888::new(color.r, color.g, color.b)
    }
}

/// An in-memory RGB framebuffer the page is drawn into.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb([background.r, background.g, background.b])),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image
            .get_pixel_checked(x, y)
            .map(|Rgb([r, g, b])| Color::rgb(*r, *g, *b))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.image.dimensions();
        for Pixel(Point { x, y }, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
                continue;
            };
            if x >= width || y >= height {
                continue;
            }
            self.image
                .put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = Rgb([color.r(), color.g(), color.b()]);
        for pixel in self.image.pixels_mut() {
            *pixel = fill;
        }
        Ok(())
    }
}

const FONTS: [&MonoFont<'static>; 13] = [
    &FONT_4X6, &FONT_5X7, &FONT_5X8, &FONT_6X9, &FONT_6X10, &FONT_6X12, &FONT_6X13, &FONT_7X13,
    &FONT_7X14, &FONT_8X13, &FONT_9X15, &FONT_9X18, &FONT_10X20,
];

/// The mono font whose glyph height is closest to `size_px`. Ties go to the
/// smaller font; sizes above the largest font get the largest.
pub fn font_for_size(size_px: u32) -> &'static MonoFont<'static> {
    let mut best = FONTS[0];
    for font in FONTS {
        let distance = font.character_size.height.abs_diff(size_px);
        if distance < best.character_size.height.abs_diff(size_px) {
            best = font;
        }
    }
    best
}

/// Character-cell measurement for a mono font.
#[derive(Clone, Copy)]
pub struct MonoMeasure {
    font: &'static MonoFont<'static>,
}

impl MonoMeasure {
    pub fn new(font: &'static MonoFont<'static>) -> Self {
        Self { font }
    }

    pub fn font(&self) -> &'static MonoFont<'static> {
        self.font
    }

    pub fn line_height(&self) -> u32 {
        self.font.character_size.height
    }

    fn advance(&self) -> u32 {
        self.font.character_size.width + self.font.character_spacing
    }
}

impl TextMeasure for MonoMeasure {
    fn text_width(&self, text: &str) -> u32 {
        let cells = u32::try_from(text.width()).unwrap_or(u32::MAX);
        cells.saturating_mul(self.advance())
    }
}

/// Folds a label down to what the ASCII mono fonts can draw.
pub fn fold_to_ascii(text: &str) -> String {
    deunicode::deunicode(text)
}

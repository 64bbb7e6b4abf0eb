use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{Point, Size};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use serde::Serialize;
use tracing::debug;

use crate::axis::{AxisMapper, PixelBand, VerticalSpan};
use crate::canvas::{Canvas, MonoMeasure, fold_to_ascii, font_for_size};
use crate::color::Color;
use crate::config::Config;
use crate::datetime::hour_of_day;
use crate::day::{Agenda, DayBucket};
use crate::event::{EventId, Interval};
use crate::layout::{Placement, layout};
use crate::textflow::{TextMeasure, truncate_text, wrap_text};

const ELLIPSIS: &str = "...";
const ACCENT_WIDTH: i32 = 6;
const BLOCK_INSET: i32 = 3;
const TEXT_PADDING: i32 = 4;
const LINE_SPACING: i32 = 2;
const SECTION_SPACING: i32 = 10;

/// Colors and fonts resolved from the configuration.
#[derive(Clone, Copy)]
pub struct Theme {
    pub background: Color,
    pub grid: Color,
    pub text: Color,
    pub title: MonoMeasure,
    pub body: MonoMeasure,
    pub footer: MonoMeasure,
}

impl Theme {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            background: cfg.background_color,
            grid: cfg.grid_color,
            text: cfg.text_color,
            title: MonoMeasure::new(font_for_size(cfg.title_font_size)),
            body: MonoMeasure::new(font_for_size(cfg.body_font_size)),
            footer: MonoMeasure::new(font_for_size(cfg.footer_font_size)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    fn from_edges(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: u32::try_from(x2 - x1).unwrap_or(0),
            height: u32::try_from(y2 - y1).unwrap_or(0),
        }
    }

    fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    fn to_primitive(self) -> Rectangle {
        Rectangle::new(Point::new(self.x, self.y), Size::new(self.width, self.height))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HourTick {
    pub hour: u32,
    pub y: i32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventBlock {
    pub id: EventId,
    pub label: String,
    pub source: String,
    pub fill: Color,
    pub placement: Placement,
    pub span: VerticalSpan,
    pub rect: Rect,
    pub time_label: Option<String>,
    pub title_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllDayChip {
    pub id: EventId,
    pub label: String,
    pub source: String,
    pub fill: Color,
    pub rect: Rect,
}

/// Everything drawn for one day column.
#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub day: NaiveDate,
    pub title: String,
    pub gutter_left: i32,
    pub all_day_row: Rect,
    pub grid: Rect,
    pub ticks: Vec<HourTick>,
    pub all_day: Vec<AllDayChip>,
    /// `+N more` summary occupying the last all-day slot, if anything was
    /// left out.
    pub overflow: Option<AllDayOverflow>,
    pub blocks: Vec<EventBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllDayOverflow {
    pub hidden: usize,
    pub label: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagePlan {
    pub width: u32,
    pub height: u32,
    pub days: Vec<DayPlan>,
    pub footer: String,
    pub footer_origin: (i32, i32),
}

/// Computes every rectangle and text line of the page without drawing.
#[tracing::instrument(skip_all, fields(width = cfg.render_width, height = cfg.render_height))]
pub fn plan_page(agenda: &Agenda, cfg: &Config, theme: &Theme, now: DateTime<Tz>) -> PagePlan {
    let width = cfg.render_width as i32;
    let height = cfg.render_height as i32;
    let margin = cfg.margin as i32;
    let gap = cfg.column_gap as i32;
    let gutter = cfg.hour_label_width as i32;

    let all_day_top = margin + theme.title.line_height() as i32 + SECTION_SPACING;
    let all_day_bottom = all_day_top + cfg.all_day_row_height as i32;
    let axis_top = all_day_bottom + SECTION_SPACING;
    let axis_bottom = (height - margin - theme.footer.line_height() as i32 - SECTION_SPACING)
        .max(axis_top + 1);
    let column_width = ((width - 2 * margin - gap - 2 * gutter) / 2).max(1);

    let mapper = AxisMapper::new(
        cfg.hour_window(),
        PixelBand {
            top: axis_top,
            bottom: axis_bottom,
        },
        cfg.min_event_height,
    );

    let days = agenda
        .buckets()
        .into_iter()
        .zip(["Today", "Tomorrow"])
        .enumerate()
        .map(|(index, (bucket, title))| {
            let gutter_left = margin + index as i32 * (gutter + column_width + gap);
            let grid_left = gutter_left + gutter;
            let frame = ColumnFrame {
                gutter_left,
                all_day_row: Rect::from_edges(
                    grid_left,
                    all_day_top,
                    grid_left + column_width,
                    all_day_bottom,
                ),
                grid: Rect::from_edges(
                    grid_left,
                    axis_top,
                    grid_left + column_width,
                    axis_bottom,
                ),
            };
            plan_day(bucket, title, frame, &mapper, cfg, theme)
        })
        .collect();

    let footer = fold_to_ascii(&format!(
        "Last update: {} {}",
        now.with_timezone(&cfg.timezone).format("%Y-%m-%d %H:%M"),
        cfg.timezone
    ));
    let footer_origin = (
        width - margin - theme.footer.text_width(&footer) as i32,
        height - margin - theme.footer.line_height() as i32,
    );

    PagePlan {
        width: cfg.render_width,
        height: cfg.render_height,
        days,
        footer,
        footer_origin,
    }
}

struct ColumnFrame {
    gutter_left: i32,
    all_day_row: Rect,
    grid: Rect,
}

fn plan_day(
    bucket: &DayBucket,
    title: &str,
    frame: ColumnFrame,
    mapper: &AxisMapper,
    cfg: &Config,
    theme: &Theme,
) -> DayPlan {
    let day = bucket.day();
    let tz = &cfg.timezone;
    let window = mapper.window();

    let ticks = (window.start_hour..=window.end_hour)
        .map(|hour| HourTick {
            hour,
            y: mapper.map_instant(hour_of_day(tz, day, hour), day, tz),
            label: format!("{hour:02}:00"),
        })
        .collect();

    let (all_day, overflow) = plan_all_day(&bucket.all_day, frame.all_day_row, theme);

    let timed_layout = layout(&bucket.timed);
    let blocks: Vec<EventBlock> = timed_layout
        .place(&bucket.timed)
        .into_iter()
        .map(|(interval, placement)| {
            let span = mapper.span(interval, day, tz);
            plan_block(interval, placement, span, frame.grid, theme)
        })
        .collect();

    debug!(
        day = %day,
        blocks = blocks.len(),
        groups = timed_layout.groups().len(),
        all_day = bucket.all_day.len(),
        "planned day column"
    );

    DayPlan {
        day,
        title: title.to_string(),
        gutter_left: frame.gutter_left,
        all_day_row: frame.all_day_row,
        grid: frame.grid,
        ticks,
        all_day,
        overflow,
        blocks,
    }
}

fn plan_all_day(
    intervals: &[Interval],
    row: Rect,
    theme: &Theme,
) -> (Vec<AllDayChip>, Option<AllDayOverflow>) {
    let chip_height = theme.body.line_height() as i32 + 2 * LINE_SPACING;
    let slots = (row.height as i32 / (chip_height + LINE_SPACING)).max(0) as usize;
    let label_width = (row.width as i32 - ACCENT_WIDTH - 2 * TEXT_PADDING).max(0) as u32;

    let slot_rect = |slot: usize| {
        let y = row.y + slot as i32 * (chip_height + LINE_SPACING);
        Rect::from_edges(row.x, y, row.right(), y + chip_height)
    };

    let shown = if intervals.len() > slots {
        slots.saturating_sub(1)
    } else {
        intervals.len()
    };

    let chips = intervals
        .iter()
        .take(shown)
        .enumerate()
        .map(|(slot, interval)| AllDayChip {
            id: interval.id,
            label: truncate_text(
                &fold_to_ascii(&interval.label),
                &theme.body,
                label_width,
                ELLIPSIS,
            ),
            source: interval.source.clone(),
            fill: interval.fill,
            rect: slot_rect(slot),
        })
        .collect();

    let hidden = intervals.len() - shown;
    let overflow = (hidden > 0 && slots > 0).then(|| AllDayOverflow {
        hidden,
        label: format!("+{hidden} more"),
        rect: slot_rect(shown),
    });

    (chips, overflow)
}

fn plan_block(
    interval: &Interval,
    placement: Placement,
    span: VerticalSpan,
    grid: Rect,
    theme: &Theme,
) -> EventBlock {
    let columns = placement.columns.max(1) as i32;
    let column = placement.column as i32;
    let slot = grid.width as i32 / columns;

    let x1 = grid.x + column * slot + BLOCK_INSET;
    let x2 = if column + 1 == columns {
        grid.right() - BLOCK_INSET
    } else {
        grid.x + (column + 1) * slot - BLOCK_INSET
    }
    .max(x1 + 1);
    let rect = Rect::from_edges(x1, span.y1, x2, span.y2);

    let text_left = x1 + ACCENT_WIDTH + TEXT_PADDING;
    let max_width = (x2 - text_left - TEXT_PADDING).max(0) as u32;
    let mut cursor = span.y1 + TEXT_PADDING;

    let footer_height = theme.footer.line_height() as i32;
    let time_label = if cursor + footer_height <= span.y2 && max_width > 0 {
        let label = format!(
            "{}-{}",
            interval.start.format("%H:%M"),
            interval.end.format("%H:%M")
        );
        cursor += footer_height + LINE_SPACING;
        Some(truncate_text(&label, &theme.footer, max_width, ELLIPSIS))
    } else {
        None
    };

    let body_height = theme.body.line_height() as i32;
    let room = ((span.y2 - cursor + LINE_SPACING) / (body_height + LINE_SPACING)).max(0) as usize;
    let title_lines = if max_width == 0 {
        Vec::new()
    } else {
        fit_lines(
            wrap_text(&fold_to_ascii(&interval.label), &theme.body, max_width),
            room,
            &theme.body,
            max_width,
        )
    };

    EventBlock {
        id: interval.id,
        label: interval.label.clone(),
        source: interval.source.clone(),
        fill: interval.fill,
        placement,
        span,
        rect,
        time_label,
        title_lines,
    }
}

/// Keeps at most `room` lines; the last kept line absorbs the rest and is
/// ellipsised.
fn fit_lines<M: TextMeasure>(lines: Vec<String>, room: usize, measure: &M, max_width: u32) -> Vec<String> {
    if room == 0 {
        return Vec::new();
    }

    let mut kept: Vec<String> = if lines.len() > room {
        let rest = lines[room - 1..].join(" ");
        let mut head = lines[..room - 1].to_vec();
        head.push(format!("{rest}{ELLIPSIS}"));
        head
    } else {
        lines
    };

    for line in &mut kept {
        *line = truncate_text(line, measure, max_width, ELLIPSIS);
    }
    kept
}

/// Draws a planned page onto any RGB draw target.
pub fn draw_page<D>(plan: &PagePlan, theme: &Theme, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    target.clear(theme.background.into())?;

    for day in &plan.days {
        draw_text(
            target,
            &day.title,
            Point::new(day.grid.x, day.all_day_row.y - theme.title.line_height() as i32 - SECTION_SPACING),
            theme.title,
            theme.text,
        )?;
        draw_grid(target, day, theme)?;
        draw_all_day(target, day, theme)?;
        for block in &day.blocks {
            draw_block(target, block, theme)?;
        }
    }

    draw_text(
        target,
        &plan.footer,
        Point::new(plan.footer_origin.0, plan.footer_origin.1),
        theme.footer,
        theme.text,
    )
}

fn draw_grid<D>(target: &mut D, day: &DayPlan, theme: &Theme) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let line_style = PrimitiveStyle::with_stroke(Rgb888::from(theme.grid), 1);
    let half_label = theme.footer.line_height() as i32 / 2;

    for tick in &day.ticks {
        Line::new(Point::new(day.grid.x, tick.y), Point::new(day.grid.right(), tick.y))
            .into_styled(line_style)
            .draw(target)?;

        let label_width = theme.footer.text_width(&tick.label) as i32;
        let x = (day.grid.x - label_width - TEXT_PADDING).max(day.gutter_left);
        draw_text(
            target,
            &tick.label,
            Point::new(x, tick.y - half_label),
            theme.footer,
            theme.text,
        )?;
    }

    Line::new(
        Point::new(day.all_day_row.x, day.all_day_row.bottom()),
        Point::new(day.all_day_row.right(), day.all_day_row.bottom()),
    )
    .into_styled(line_style)
    .draw(target)
}

fn draw_all_day<D>(target: &mut D, day: &DayPlan, theme: &Theme) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    for chip in &day.all_day {
        fill(target, chip.rect, chip.fill)?;
        let accent = Rect {
            width: chip.rect.width.min(ACCENT_WIDTH as u32),
            ..chip.rect
        };
        fill(target, accent, theme.text)?;
        draw_text(
            target,
            &chip.label,
            Point::new(chip.rect.x + ACCENT_WIDTH + TEXT_PADDING, chip.rect.y + LINE_SPACING),
            theme.body,
            theme.text,
        )?;
    }

    if let Some(overflow) = &day.overflow {
        draw_text(
            target,
            &overflow.label,
            Point::new(overflow.rect.x + ACCENT_WIDTH + TEXT_PADDING, overflow.rect.y + LINE_SPACING),
            theme.body,
            theme.text,
        )?;
    }
    Ok(())
}

fn draw_block<D>(target: &mut D, block: &EventBlock, theme: &Theme) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    fill(target, block.rect, block.fill)?;
    let accent = Rect {
        width: block.rect.width.min(ACCENT_WIDTH as u32),
        ..block.rect
    };
    fill(target, accent, theme.text)?;

    let text_left = block.rect.x + ACCENT_WIDTH + TEXT_PADDING;
    let mut cursor = block.rect.y + TEXT_PADDING;

    if let Some(time_label) = &block.time_label {
        draw_text(target, time_label, Point::new(text_left, cursor), theme.footer, theme.text)?;
        cursor += theme.footer.line_height() as i32 + LINE_SPACING;
    }

    for line in &block.title_lines {
        draw_text(target, line, Point::new(text_left, cursor), theme.body, theme.text)?;
        cursor += theme.body.line_height() as i32 + LINE_SPACING;
    }
    Ok(())
}

fn fill<D>(target: &mut D, rect: Rect, color: Color) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    rect.to_primitive()
        .into_styled(PrimitiveStyle::with_fill(Rgb888::from(color)))
        .draw(target)
}

fn draw_text<D>(
    target: &mut D,
    text: &str,
    origin: Point,
    measure: MonoMeasure,
    color: Color,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let style = MonoTextStyle::new(measure.font(), Rgb888::from(color));
    Text::with_baseline(text, origin, style, Baseline::Top).draw(target)?;
    Ok(())
}

/// Plans and draws the page into a fresh canvas.
pub fn render_page(agenda: &Agenda, cfg: &Config, now: DateTime<Tz>) -> (PagePlan, Canvas) {
    let theme = Theme::from_config(cfg);
    let plan = plan_page(agenda, cfg, &theme, now);
    let mut canvas = Canvas::new(plan.width, plan.height, theme.background);
    match draw_page(&plan, &theme, &mut canvas) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    (plan, canvas)
}

use std::io::Write;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::event::EventId;
use crate::layout::Placement;
use crate::render::{PagePlan, Rect};

#[derive(Debug, Serialize)]
pub struct LayoutReport<'a> {
    pub width: u32,
    pub height: u32,
    pub days: Vec<DayReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct DayReport<'a> {
    pub day: NaiveDate,
    pub title: &'a str,
    pub timed: Vec<TimedEntry<'a>>,
    pub all_day: Vec<AllDayEntry<'a>>,
    pub hidden_all_day: usize,
}

#[derive(Debug, Serialize)]
pub struct TimedEntry<'a> {
    pub id: EventId,
    pub label: &'a str,
    pub source: &'a str,
    pub time: Option<&'a str>,
    #[serde(flatten)]
    pub placement: Placement,
    pub rect: Rect,
}

#[derive(Debug, Serialize)]
pub struct AllDayEntry<'a> {
    pub id: EventId,
    pub label: &'a str,
    pub source: &'a str,
}

impl<'a> LayoutReport<'a> {
    pub fn from_plan(plan: &'a PagePlan) -> Self {
        let days = plan
            .days
            .iter()
            .map(|day| DayReport {
                day: day.day,
                title: &day.title,
                timed: day
                    .blocks
                    .iter()
                    .map(|block| TimedEntry {
                        id: block.id,
                        label: &block.label,
                        source: &block.source,
                        time: block.time_label.as_deref(),
                        placement: block.placement,
                        rect: block.rect,
                    })
                    .collect(),
                all_day: day
                    .all_day
                    .iter()
                    .map(|chip| AllDayEntry {
                        id: chip.id,
                        label: &chip.label,
                        source: &chip.source,
                    })
                    .collect(),
                hidden_all_day: day.overflow.as_ref().map_or(0, |o| o.hidden),
            })
            .collect();

        Self {
            width: plan.width,
            height: plan.height,
            days,
        }
    }
}

/// Pretty JSON dump of the page layout, one object per day column.
pub fn write_layout<W: Write>(plan: &PagePlan, mut out: W) -> anyhow::Result<()> {
    let report = LayoutReport::from_plan(plan);
    serde_json::to_writer_pretty(&mut out, &report).context("failed to serialize layout")?;
    writeln!(out)?;
    Ok(())
}

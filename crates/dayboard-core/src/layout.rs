//! Column assignment for overlapping timed events.
//!
//! Intervals are swept in `(start, end)` order. The sweep first cuts the
//! sequence into groups of transitively overlapping intervals, then packs
//! each group into columns first-fit, reusing a column once its occupant has
//! ended. Every member of a group shares the group's column count so the
//! renderer can draw equal-width columns.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, trace};

use crate::event::{EventId, Interval};

/// Where one interval sits inside its group. `column < columns` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Placement {
    pub column: usize,
    pub columns: usize,
}

/// A maximal run of transitively overlapping intervals.
#[derive(Debug, Clone)]
pub struct LayoutGroup {
    /// Members in sweep order.
    pub members: Vec<EventId>,
    pub columns: usize,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    groups: Vec<LayoutGroup>,
    placements: HashMap<EventId, Placement>,
}

impl Layout {
    pub fn placement(&self, id: EventId) -> Option<Placement> {
        self.placements.get(&id).copied()
    }

    pub fn groups(&self) -> &[LayoutGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Pairs each interval with its placement, keeping the caller's order.
    /// Intervals that were not part of this layout are skipped.
    pub fn place<'a>(&self, intervals: &'a [Interval]) -> Vec<(&'a Interval, Placement)> {
        intervals
            .iter()
            .filter_map(|interval| Some((interval, self.placement(interval.id)?)))
            .collect()
    }
}

/// Lays out one day's timed intervals.
///
/// Total over any finite input. Passing an all-day interval is a caller bug.
#[tracing::instrument(skip_all, fields(count = intervals.len()))]
pub fn layout(intervals: &[Interval]) -> Layout {
    let mut order: Vec<&Interval> = intervals.iter().collect();
    // stable: identical (start, end) pairs keep input order
    order.sort_by_key(|interval| (interval.start, interval.end));

    let mut result = Layout::default();
    for members in group_overlapping(&order) {
        let (columns, count) = pack_columns(&members);

        for (interval, column) in members.iter().zip(columns) {
            result.placements.insert(
                interval.id,
                Placement {
                    column,
                    columns: count,
                },
            );
        }

        let group = LayoutGroup {
            members: members.iter().map(|interval| interval.id).collect(),
            columns: count,
            start: members[0].start,
            end: members
                .iter()
                .map(|interval| interval.end)
                .max()
                .unwrap_or(members[0].end),
        };
        trace!(
            size = group.members.len(),
            columns = group.columns,
            start = %group.start,
            end = %group.end,
            "laid out group"
        );
        result.groups.push(group);
    }

    debug!(
        intervals = result.placements.len(),
        groups = result.groups.len(),
        "layout complete"
    );
    result
}

/// One linear pass over start-sorted intervals. A new group opens only when
/// an interval starts strictly after everything seen so far has ended.
fn group_overlapping<'a>(sorted: &[&'a Interval]) -> Vec<Vec<&'a Interval>> {
    let mut groups: Vec<Vec<&'a Interval>> = Vec::new();
    let mut group_end: Option<DateTime<Tz>> = None;

    for &interval in sorted {
        debug_assert!(
            !interval.all_day,
            "all-day interval {} passed to timed layout",
            interval.id
        );

        match (groups.last_mut(), group_end) {
            (Some(group), Some(end)) if interval.start <= end => {
                group.push(interval);
                group_end = Some(end.max(interval.end));
            }
            _ => {
                groups.push(vec![interval]);
                group_end = Some(interval.end);
            }
        }
    }

    groups
}

/// First-fit column packing. Returns each member's column and the group's
/// column count (its peak simultaneous overlap).
fn pack_columns(members: &[&Interval]) -> (Vec<usize>, usize) {
    // (occupant end, column), earliest end on top
    let mut open: BinaryHeap<Reverse<(DateTime<Tz>, usize)>> = BinaryHeap::new();
    let mut free: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    let mut next_column = 0usize;
    let mut max_columns = 0usize;
    let mut assigned = Vec::with_capacity(members.len());

    for interval in members {
        // touching endpoints do not conflict
        while let Some(&Reverse((end, column))) = open.peek() {
            if end > interval.start {
                break;
            }
            open.pop();
            free.push(Reverse(column));
        }

        let column = match free.pop() {
            Some(Reverse(column)) => column,
            None => {
                next_column += 1;
                next_column - 1
            }
        };

        open.push(Reverse((interval.end, column)));
        max_columns = max_columns.max(open.len());
        assigned.push(column);
    }

    (assigned, max_columns)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use super::{Placement, layout};
    use crate::color::Color;
    use crate::event::Interval;

    fn at(h: u32, m: u32) -> chrono::DateTime<Tz> {
        chrono_tz::UTC
            .with_ymd_and_hms(2026, 2, 17, h, m, 0)
            .single()
            .expect("valid time")
    }

    fn span(label: &str, start: (u32, u32), end: (u32, u32)) -> Interval {
        Interval::new(
            at(start.0, start.1),
            at(end.0, end.1),
            false,
            label,
            "cal",
            Color::WHITE,
        )
    }

    fn placed(column: usize, columns: usize) -> Placement {
        Placement { column, columns }
    }

    #[test]
    fn freed_column_is_reused_within_group() {
        let a = span("A", (9, 0), (10, 0));
        let b = span("B", (9, 30), (11, 0));
        let c = span("C", (10, 30), (10, 45));
        let result = layout(&[a.clone(), b.clone(), c.clone()]);

        assert_eq!(result.groups().len(), 1);
        assert_eq!(result.placement(a.id), Some(placed(0, 2)));
        assert_eq!(result.placement(b.id), Some(placed(1, 2)));
        assert_eq!(result.placement(c.id), Some(placed(0, 2)));
    }

    #[test]
    fn back_to_back_events_share_one_column() {
        let first = span("first", (9, 0), (10, 0));
        let second = span("second", (10, 0), (11, 0));
        let result = layout(&[first.clone(), second.clone()]);

        assert_eq!(result.placement(first.id), Some(placed(0, 1)));
        assert_eq!(result.placement(second.id), Some(placed(0, 1)));
    }

    #[test]
    fn disjoint_events_form_separate_groups() {
        let morning = span("m", (8, 0), (9, 0));
        let evening = span("e", (18, 0), (19, 0));
        let result = layout(&[evening.clone(), morning.clone()]);

        assert_eq!(result.groups().len(), 2);
        assert_eq!(result.groups()[0].members, vec![morning.id]);
        assert_eq!(result.placement(evening.id), Some(placed(0, 1)));
    }

    #[test]
    fn identical_events_get_their_own_columns_in_input_order() {
        let from_work = span("standup", (9, 0), (9, 15));
        let from_home = span("standup", (9, 0), (9, 15));
        let result = layout(&[from_work.clone(), from_home.clone()]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.placement(from_work.id), Some(placed(0, 2)));
        assert_eq!(result.placement(from_home.id), Some(placed(1, 2)));
    }

    #[test]
    fn group_count_is_shared_even_by_shallow_members() {
        // x sorts ahead of long (same start, earlier end); z reuses x's column
        let long = span("long", (9, 0), (12, 0));
        let x = span("x", (9, 0), (10, 0));
        let y = span("y", (9, 30), (10, 30));
        let z = span("z", (11, 0), (11, 30));
        let result = layout(&[long.clone(), x.clone(), y.clone(), z.clone()]);

        assert_eq!(result.groups().len(), 1);
        for id in [long.id, x.id, y.id, z.id] {
            assert_eq!(result.placement(id).map(|p| p.columns), Some(3));
        }
        assert_eq!(result.placement(z.id), Some(placed(0, 3)));
    }

    #[test]
    fn chain_of_overlaps_is_one_group() {
        let a = span("a", (9, 0), (10, 0));
        let b = span("b", (9, 45), (11, 0));
        let c = span("c", (10, 50), (12, 0));
        let result = layout(&[a, b, c]);

        assert_eq!(result.groups().len(), 1);
        assert_eq!(result.groups()[0].columns, 2);
    }

    #[test]
    fn place_keeps_caller_order() {
        let late = span("late", (15, 0), (16, 0));
        let early = span("early", (8, 0), (9, 0));
        let input = vec![late.clone(), early.clone()];
        let result = layout(&input);
        let pairs = result.place(&input);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.id, late.id);
        assert_eq!(pairs[1].0.id, early.id);
    }

    #[test]
    fn empty_input_yields_empty_layout() {
        let result = layout(&[]);
        assert!(result.is_empty());
        assert!(result.groups().is_empty());
    }
}

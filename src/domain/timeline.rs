use crate::domain;
use crate::domain::task::driven_ports::TaskReader;
use crate::domain::task::{DateWindow, Task, TaskFilter};
use crate::domain::user::User;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use thiserror::Error;
use validator::ValidationErrors;

/// Widest calendar the timeline will render in one request
pub const MAX_TIMELINE_DAYS: i64 = 62;

/// An inclusive, non-empty range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl CalendarRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<CalendarRange, ValidationErrors> {
        if from > to {
            return Err(domain::field_error(
                "to",
                "range_order",
                "to must not be earlier than from",
            ));
        }
        if (to - from).num_days() + 1 > MAX_TIMELINE_DAYS {
            return Err(domain::field_error(
                "to",
                "range_length",
                "the timeline covers at most 62 days",
            ));
        }

        Ok(CalendarRange { from, to })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..=(self.to - self.from).num_days()).map(|offset| self.from + Duration::days(offset))
    }

    fn window(&self) -> DateWindow {
        DateWindow {
            from: Some(self.from),
            to: Some(self.to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub owner_user_id: i32,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub days: Vec<CalendarDay>,
    pub legend: Vec<LegendEntry>,
}

/// Stable color for a legend key: FNV-1a over the key picks the hue
pub fn legend_color(key: &str) -> String {
    let hash = key.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    });

    format!("hsl({}, 65%, 55%)", hash % 360)
}

pub fn owner_legend(owner: &User) -> LegendEntry {
    LegendEntry {
        owner_user_id: owner.id,
        label: owner.display_name.clone(),
        color: legend_color(&format!("{}:{}", owner.id, owner.display_name)),
    }
}

/// Lays tasks out on the calendar. A task shows up in every cell its schedule covers;
/// within a cell tasks keep the order they were given in.
pub fn build_calendar(range: &CalendarRange, tasks: &[Task]) -> Vec<CalendarDay> {
    range
        .days()
        .map(|date| CalendarDay {
            date,
            tasks: tasks
                .iter()
                .filter(|task| {
                    task.schedule_span()
                        .is_some_and(|(start, end)| start <= date && date <= end)
                })
                .cloned()
                .collect(),
        })
        .collect()
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum TimelineError {
        #[error("timeline range was invalid: {0}")]
        Invalid(#[from] ValidationErrors),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    pub trait TimelinePort {
        async fn timeline(
            &self,
            owner: &User,
            from: NaiveDate,
            to: NaiveDate,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Timeline, TimelineError>;
    }
}

pub struct TimelineService {}

impl driving_ports::TimelinePort for TimelineService {
    async fn timeline(
        &self,
        owner: &User,
        from: NaiveDate,
        to: NaiveDate,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Timeline, driving_ports::TimelineError> {
        let range = CalendarRange::new(from, to)?;
        let filter = TaskFilter {
            window: range.window(),
            ..TaskFilter::default()
        };
        let tasks = task_read
            .tasks_for_user(owner.id, &filter, ext_cxn)
            .await
            .context("loading scheduled tasks for the timeline")?;

        Ok(Timeline {
            days: build_calendar(&range, &tasks),
            legend: vec![owner_legend(owner)],
        })
    }
}

use super::task::{Priority, TaskStatus};
use crate::domain;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

/// Calendar range to render
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimelineQuery {
    /// First day shown, inclusive
    pub from: NaiveDate,
    /// Last day shown, inclusive. At most 62 days after `from` counting both ends.
    pub to: NaiveDate,
}

/// The parts of a task a calendar cell shows
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TimelineTask {
    #[schema(example = 10)]
    pub id: i32,
    #[schema(example = "Write release notes")]
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[schema(example = 50)]
    pub progress: i32,
    /// Legend color of the task's owner
    #[schema(example = "hsl(212, 65%, 55%)")]
    pub color: String,
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub tasks: Vec<TimelineTask>,
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct LegendEntry {
    #[schema(example = "Ada Lovelace")]
    pub label: String,
    #[schema(example = "hsl(212, 65%, 55%)")]
    pub color: String,
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct Timeline {
    pub days: Vec<CalendarDay>,
    pub legend: Vec<LegendEntry>,
}

impl From<domain::timeline::Timeline> for Timeline {
    fn from(value: domain::timeline::Timeline) -> Self {
        let colors: HashMap<i32, String> = value
            .legend
            .iter()
            .map(|entry| (entry.owner_user_id, entry.color.clone()))
            .collect();

        Timeline {
            days: value
                .days
                .into_iter()
                .map(|day| CalendarDay {
                    date: day.date,
                    tasks: day
                        .tasks
                        .into_iter()
                        .map(|task| TimelineTask {
                            progress: task.progress(),
                            color: colors.get(&task.owner_user_id).cloned().unwrap_or_default(),
                            id: task.id,
                            title: task.title,
                            status: task.status.into(),
                            priority: task.priority.into(),
                        })
                        .collect(),
                })
                .collect(),
            legend: value
                .legend
                .into_iter()
                .map(|entry| LegendEntry {
                    label: entry.label,
                    color: entry.color,
                })
                .collect(),
        }
    }
}

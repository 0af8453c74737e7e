use super::{double_option, validation_error};
use crate::domain;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

const MAX_TITLE_CHARS: usize = 200;
const MAX_TAG_CHARS: usize = 32;
const MAX_CHECKLIST_LABEL_CHARS: usize = 200;

/// Board column a task sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Done,
}

impl From<domain::task::TaskStatus> for TaskStatus {
    fn from(value: domain::task::TaskStatus) -> Self {
        match value {
            domain::task::TaskStatus::Backlog => Self::Backlog,
            domain::task::TaskStatus::InProgress => Self::InProgress,
            domain::task::TaskStatus::Done => Self::Done,
        }
    }
}

impl From<TaskStatus> for domain::task::TaskStatus {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Backlog => Self::Backlog,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Done => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Med,
    High,
}

impl From<domain::task::Priority> for Priority {
    fn from(value: domain::task::Priority) -> Self {
        match value {
            domain::task::Priority::Low => Self::Low,
            domain::task::Priority::Med => Self::Med,
            domain::task::Priority::High => Self::High,
        }
    }
}

impl From<Priority> for domain::task::Priority {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Low => Self::Low,
            Priority::Med => Self::Med,
            Priority::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChecklistItem {
    #[schema(example = "Draft the outline")]
    pub label: String,
    #[serde(default)]
    pub checked: bool,
}

impl From<domain::task::ChecklistItem> for ChecklistItem {
    fn from(value: domain::task::ChecklistItem) -> Self {
        ChecklistItem {
            label: value.label,
            checked: value.checked,
        }
    }
}

impl From<ChecklistItem> for domain::task::ChecklistItem {
    fn from(value: ChecklistItem) -> Self {
        domain::task::ChecklistItem {
            label: value.label,
            checked: value.checked,
        }
    }
}

/// Titles are stored trimmed, so their limits apply to the trimmed text
fn valid_title(title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(validation_error("blank", "must contain more than whitespace"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(validation_error("title_length", "titles may be at most 200 characters"));
    }

    Ok(())
}

fn valid_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|tag| tag.trim().chars().count() > MAX_TAG_CHARS) {
        return Err(validation_error("tag_length", "tags may be at most 32 characters"));
    }

    Ok(())
}

fn valid_checklist(items: &[ChecklistItem]) -> Result<(), ValidationError> {
    for item in items {
        let label = item.label.trim();
        if label.is_empty() {
            return Err(validation_error("blank_label", "checklist labels must not be blank"));
        }
        if label.chars().count() > MAX_CHECKLIST_LABEL_CHARS {
            return Err(validation_error(
                "label_length",
                "checklist labels may be at most 200 characters",
            ));
        }
    }

    Ok(())
}

/// DTO for a task returned on the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq))]
pub struct Task {
    #[schema(example = 10)]
    pub id: i32,
    #[schema(example = "Write release notes")]
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[schema(example = 0)]
    pub order: i32,
    pub tags: Vec<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    /// Manually entered progress. Ignored for display while the task has a checklist.
    #[schema(example = 0)]
    pub percent: i32,
    /// Progress to display: derived from the checklist when there is one
    #[schema(example = 50)]
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<domain::task::Task> for Task {
    fn from(value: domain::task::Task) -> Self {
        let progress = value.progress();
        Task {
            id: value.id,
            title: value.title,
            description: value.description,
            status: value.status.into(),
            priority: value.priority.into(),
            order: value.order,
            tags: value.tags,
            start_at: value.start_at,
            due_at: value.due_at,
            checklist: value
                .checklist
                .map(|items| items.into_iter().map(ChecklistItem::from).collect()),
            percent: value.percent,
            progress,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// DTO for creating a new task via the API
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct NewTask {
    #[schema(example = "Write release notes")]
    #[validate(custom = "valid_title")]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    /// Defaults to backlog
    pub status: Option<TaskStatus>,
    /// Defaults to med
    pub priority: Option<Priority>,
    #[serde(default)]
    #[validate(length(max = 20), custom = "valid_tags")]
    pub tags: Vec<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(length(max = 100), custom = "valid_checklist")]
    pub checklist: Option<Vec<ChecklistItem>>,
    #[validate(range(min = 0, max = 100))]
    pub percent: Option<i32>,
}

impl From<NewTask> for domain::task::NewTask {
    fn from(value: NewTask) -> Self {
        domain::task::NewTask {
            title: value.title,
            description: value.description,
            status: value.status.map(Into::into).unwrap_or_default(),
            priority: value.priority.map(Into::into).unwrap_or_default(),
            tags: value.tags,
            start_at: value.start_at,
            due_at: value.due_at,
            checklist: value
                .checklist
                .map(|items| items.into_iter().map(Into::into).collect()),
            percent: value.percent.unwrap_or(0),
        }
    }
}

/// DTO for a partial task update. Omitted fields are left alone; `null` clears the
/// description, schedule dates and checklist.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTask {
    #[validate(custom = "valid_title")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 5000))]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[validate(length(max = 20), custom = "valid_tags")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Vec<ChecklistItem>>)]
    #[validate(length(max = 100), custom = "valid_checklist")]
    pub checklist: Option<Option<Vec<ChecklistItem>>>,
    #[validate(range(min = 0, max = 100))]
    pub percent: Option<i32>,
}

impl From<UpdateTask> for domain::task::TaskUpdate {
    fn from(value: UpdateTask) -> Self {
        domain::task::TaskUpdate {
            title: value.title,
            description: value.description,
            status: value.status.map(Into::into),
            priority: value.priority.map(Into::into),
            tags: value.tags,
            start_at: value.start_at,
            due_at: value.due_at,
            checklist: value
                .checklist
                .map(|checklist| checklist.map(|items| items.into_iter().map(Into::into).collect())),
            percent: value.percent,
        }
    }
}

/// Drag-and-drop target for a task
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveTask {
    pub status: TaskStatus,
    /// Zero-based slot in the destination column. Values past the end append.
    #[schema(example = 0)]
    pub position: u32,
}

impl From<MoveTask> for domain::task::TaskDestination {
    fn from(value: MoveTask) -> Self {
        domain::task::TaskDestination {
            status: value.status.into(),
            position: value.position as usize,
        }
    }
}

/// Filters for listing tasks
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    /// Only tasks in this column
    pub status: Option<TaskStatus>,
    /// Case-insensitive text to look for in the title or description
    pub q: Option<String>,
    /// Keep tasks scheduled on or after this day
    pub from: Option<NaiveDate>,
    /// Keep tasks scheduled on or before this day
    pub to: Option<NaiveDate>,
}

impl From<TaskQuery> for domain::task::TaskFilter {
    fn from(value: TaskQuery) -> Self {
        domain::task::TaskFilter {
            status: value.status.map(Into::into),
            search: value.q,
            window: domain::task::DateWindow {
                from: value.from,
                to: value.to,
            },
        }
        .normalized()
    }
}

/// A user's tasks grouped by column
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct Board {
    pub backlog: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
}

impl From<domain::task::Board> for Board {
    fn from(value: domain::task::Board) -> Self {
        let convert = |column: Vec<domain::task::Task>| -> Vec<Task> {
            column.into_iter().map(Task::from).collect()
        };
        Board {
            backlog: convert(value.backlog),
            in_progress: convert(value.in_progress),
            done: convert(value.done),
        }
    }
}

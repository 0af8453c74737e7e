use crate::domain;
use crate::domain::task::{
    ChecklistItem, NewTask, Priority, Task, TaskFilter, TaskPlacement, TaskStatus,
};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder, query, query_as};

const TASK_COLUMNS: &str = "t.id, t.owner_user_id, t.title, t.description, t.status, t.priority, \
     t.sort_order, t.tags, t.start_at, t.due_at, t.checklist, t.percent, t.created_at, t.updated_at";

/// How a checklist item is laid out inside the `checklist` JSONB column
#[derive(Serialize, Deserialize)]
struct ChecklistItemDocument {
    label: String,
    checked: bool,
}

fn checklist_document(checklist: &Option<Vec<ChecklistItem>>) -> Option<Json<Vec<ChecklistItemDocument>>> {
    checklist.as_ref().map(|items| {
        Json(
            items
                .iter()
                .map(|item| ChecklistItemDocument {
                    label: item.label.clone(),
                    checked: item.checked,
                })
                .collect(),
        )
    })
}

#[derive(FromRow)]
struct TaskRow {
    id: i32,
    owner_user_id: i32,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    sort_order: i32,
    tags: Vec<String>,
    start_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
    checklist: Option<Json<Vec<ChecklistItemDocument>>>,
    percent: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(value: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: value.id,
            owner_user_id: value.owner_user_id,
            title: value.title,
            description: value.description,
            status: TaskStatus::try_from(value.status.as_str())?,
            priority: Priority::try_from(value.priority.as_str())?,
            order: value.sort_order,
            tags: value.tags,
            start_at: value.start_at,
            due_at: value.due_at,
            checklist: value.checklist.map(|Json(items)| {
                items
                    .into_iter()
                    .map(|item| ChecklistItem {
                        label: item.label,
                        checked: item.checked,
                    })
                    .collect()
            }),
            percent: value.percent,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Escapes LIKE wildcards so search text is matched literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        if matches!(character, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}

/// Builds the listing query. Mirrors [TaskFilter::matches]: a task's schedule covers the UTC
/// days from its start (or due date) through its due date (or start).
fn task_listing_query(user_id: i32, filter: &TaskFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {TASK_COLUMNS} FROM task t WHERE t.owner_user_id = "
    ));
    builder.push_bind(user_id);

    if let Some(status) = filter.status {
        builder.push(" AND t.status = ").push_bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.window.from {
        builder
            .push(" AND (COALESCE(t.due_at, t.start_at) AT TIME ZONE 'UTC')::date >= ")
            .push_bind(from);
    }
    if let Some(to) = filter.window.to {
        builder
            .push(" AND (COALESCE(t.start_at, t.due_at) AT TIME ZONE 'UTC')::date <= ")
            .push_bind(to);
    }

    builder.push(
        " ORDER BY CASE t.status WHEN 'backlog' THEN 0 WHEN 'in_progress' THEN 1 ELSE 2 END, \
         t.sort_order, t.id",
    );
    builder
}

pub struct DbTaskReader;

impl domain::task::driven_ports::TaskReader for DbTaskReader {
    async fn tasks_for_user(
        &self,
        user_id: i32,
        filter: &TaskFilter,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        task_listing_query(user_id, filter)
            .build_query_as::<TaskRow>()
            .fetch_all(cxn.borrow_connection())
            .await
            .context("trying to fetch tasks for a user")?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn user_task_by_id(
        &self,
        user_id: i32,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let task_row = query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM task t WHERE t.owner_user_id = $1 AND t.id = $2"
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to fetch a task by ID")?;

        task_row.map(Task::try_from).transpose()
    }
}

pub struct DbTaskWriter;

impl domain::task::driven_ports::TaskWriter for DbTaskWriter {
    async fn create_task_for_user(
        &self,
        user_id: i32,
        order: i32,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let created = query_as::<_, TaskRow>(&format!(
            "INSERT INTO task AS t(owner_user_id, title, description, status, priority, sort_order, \
             tags, start_at, due_at, checklist, percent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {TASK_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(new_task.status.as_str())
        .bind(new_task.priority.as_str())
        .bind(order)
        .bind(&new_task.tags)
        .bind(new_task.start_at)
        .bind(new_task.due_at)
        .bind(checklist_document(&new_task.checklist))
        .bind(new_task.percent)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to insert a new task into the database")?;

        Task::try_from(created)
    }

    async fn save_task(
        &self,
        task: &Task,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query(
            "UPDATE task SET title = $3, description = $4, status = $5, priority = $6, \
             sort_order = $7, tags = $8, start_at = $9, due_at = $10, checklist = $11, \
             percent = $12, updated_at = $13 \
             WHERE id = $1 AND owner_user_id = $2",
        )
        .bind(task.id)
        .bind(task.owner_user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.order)
        .bind(&task.tags)
        .bind(task.start_at)
        .bind(task.due_at)
        .bind(checklist_document(&task.checklist))
        .bind(task.percent)
        .bind(task.updated_at)
        .execute(cxn.borrow_connection())
        .await
        .context("trying to update a task in the database")?;

        Ok(())
    }

    async fn set_placements(
        &self,
        user_id: i32,
        placements: &[TaskPlacement],
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        for placement in placements {
            query(
                "UPDATE task SET status = $1, sort_order = $2, updated_at = now() \
                 WHERE id = $3 AND owner_user_id = $4",
            )
            .bind(placement.status.as_str())
            .bind(placement.order)
            .bind(placement.task_id)
            .bind(user_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to reposition a task")?;
        }

        Ok(())
    }

    async fn delete_task(
        &self,
        user_id: i32,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let result = query("DELETE FROM task WHERE id = $1 AND owner_user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a task from the database")?;

        Ok(result.rows_affected() > 0)
    }
}

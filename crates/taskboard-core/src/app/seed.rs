//! Seed - 初回起動時のサンプルタスク
//!
//! ストアが空のときだけ、6 列すべてにまたがる 10 件の例を入れます。
//! 契約上の操作ではなく、起動時の便宜です。

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use crate::domain::{ExportSnapshot, Priority, StoreError, Task, TaskStatus};
use crate::ports::{IdGenerator, TaskStore};

struct Sample {
    title: &'static str,
    description: &'static str,
    status: TaskStatus,
    priority: Priority,
    tags: &'static [&'static str],
    created_ago: TimeDelta,
    updated_ago: TimeDelta,
    due_in: Option<TimeDelta>,
    estimated: u32,
    actual: Option<u32>,
}

fn samples() -> [Sample; 10] {
    let days = TimeDelta::days;
    let hours = TimeDelta::hours;
    let minutes = TimeDelta::minutes;
    [
        Sample {
            title: "Setup development environment",
            description: "Configure IDE, install dependencies, and set up version control for the new project.",
            status: TaskStatus::Done,
            priority: Priority::High,
            tags: &["development", "setup", "productivity"],
            created_ago: days(7),
            updated_ago: days(5),
            due_in: None,
            estimated: 120,
            actual: Some(90),
        },
        Sample {
            title: "Design task management interface",
            description: "Create wireframes and mockups for the board layout and card styles.",
            status: TaskStatus::Working,
            priority: Priority::High,
            tags: &["design", "ui"],
            created_ago: days(3),
            updated_ago: hours(1),
            due_in: Some(days(2)),
            estimated: 240,
            actual: None,
        },
        Sample {
            title: "Implement drag and drop functionality",
            description: "Add drag and drop support for moving tasks between different status columns.",
            status: TaskStatus::ThingToDo,
            priority: Priority::Medium,
            tags: &["feature", "interaction", "ux"],
            created_ago: days(2),
            updated_ago: days(2),
            due_in: Some(days(5)),
            estimated: 180,
            actual: None,
        },
        Sample {
            title: "Add dark mode toggle",
            description: "Implement system preference detection and manual dark/light mode switching.",
            status: TaskStatus::ThingToDo,
            priority: Priority::Low,
            tags: &["feature", "accessibility", "ui"],
            created_ago: days(1),
            updated_ago: days(1),
            due_in: None,
            estimated: 60,
            actual: None,
        },
        Sample {
            title: "Review code with team",
            description: "Schedule and conduct code review session for the new task management features.",
            status: TaskStatus::Wait,
            priority: Priority::Medium,
            tags: &["review", "collaboration", "quality"],
            created_ago: hours(6),
            updated_ago: hours(6),
            due_in: Some(days(1)),
            estimated: 90,
            actual: None,
        },
        Sample {
            title: "Task board API documentation",
            description: "Comprehensive API documentation for the task store operations with examples.",
            status: TaskStatus::Resources,
            priority: Priority::Low,
            tags: &["documentation", "api", "reference"],
            created_ago: days(4),
            updated_ago: days(3),
            due_in: None,
            estimated: 120,
            actual: None,
        },
        Sample {
            title: "Quick task creation shortcut",
            description: "Implement Ctrl+N keyboard shortcut for quick task creation.",
            status: TaskStatus::Shortcut,
            priority: Priority::Medium,
            tags: &["shortcut", "productivity", "ux"],
            created_ago: hours(5),
            updated_ago: hours(5),
            due_in: None,
            estimated: 30,
            actual: None,
        },
        Sample {
            title: "Optimize performance for large task lists",
            description: "Implement virtualization and lazy loading for handling 1000+ tasks efficiently.",
            status: TaskStatus::ThingToDo,
            priority: Priority::High,
            tags: &["performance", "optimization", "scalability"],
            created_ago: hours(1),
            updated_ago: hours(1),
            due_in: Some(days(7)),
            estimated: 300,
            actual: None,
        },
        Sample {
            title: "Add keyboard shortcuts guide",
            description: "Create an accessible help page showing all available keyboard shortcuts.",
            status: TaskStatus::Shortcut,
            priority: Priority::Low,
            tags: &["accessibility", "help", "shortcuts"],
            created_ago: minutes(30),
            updated_ago: minutes(30),
            due_in: None,
            estimated: 45,
            actual: None,
        },
        Sample {
            title: "Deploy to production",
            description: "Configure CI/CD pipeline and deploy the application to production environment.",
            status: TaskStatus::Wait,
            priority: Priority::High,
            tags: &["deployment", "devops", "production"],
            created_ago: hours(2),
            updated_ago: hours(2),
            due_in: Some(days(3)),
            estimated: 150,
            actual: None,
        },
    ]
}

/// 例のタスク一式。タイムスタンプは `now` からの相対値。
pub fn default_tasks(now: DateTime<Utc>, ids: &dyn IdGenerator) -> Vec<Task> {
    samples()
        .into_iter()
        .map(|s| Task {
            id: ids.generate_task_id(),
            title: s.title.to_string(),
            description: s.description.to_string(),
            status: s.status,
            created_at: now - s.created_ago,
            updated_at: now - s.updated_ago,
            priority: Some(s.priority),
            tags: Some(s.tags.iter().map(|t| t.to_string()).collect()),
            due_date: s.due_in.map(|d| now + d),
            estimated_time: Some(s.estimated),
            actual_time: s.actual,
        })
        .collect()
}

/// ストアが空なら例を import する。入れたら `true`。
pub async fn seed_if_empty(
    store: &dyn TaskStore,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> Result<bool, StoreError> {
    if !store.get_tasks().await?.is_empty() {
        return Ok(false);
    }
    let snapshot = ExportSnapshot::new(default_tasks(now, ids), now).to_json()?;
    let seeded = store.import_tasks(&snapshot).await?;
    info!(count = seeded.len(), "seeded default tasks");
    Ok(true)
}

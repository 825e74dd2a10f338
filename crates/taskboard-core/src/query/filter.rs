//! Filter - タスクの絞り込み条件
//!
//! 検索語は前後の空白を除いて小文字化し、title / description / タグの部分一致で探します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::task::iso8601;
use crate::domain::{Priority, Task, TaskStatus};

/// 作成日時の範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(with = "iso8601")]
    pub start: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// TaskFilters は絞り込み条件
///
/// `None`（または空の集合）は条件なし。指定された条件はすべて満たす必要がある（AND）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<TaskStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Vec<Priority>>,
    /// いずれかのタグを持っていれば通す（match-any）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl TaskFilters {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.date_range.is_none()
            && self.search_query.is_none()
    }

    /// status → priority → tags → 日付範囲 → 検索の順に評価
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_status(task)
            && self.matches_priority(task)
            && self.matches_tags(task)
            && self.matches_date_range(task)
            && self.matches_search(task)
    }

    fn matches_status(&self, task: &Task) -> bool {
        match self.status.as_deref() {
            Some(set) if !set.is_empty() => set.contains(&task.status),
            _ => true,
        }
    }

    fn matches_priority(&self, task: &Task) -> bool {
        match self.priority.as_deref() {
            Some(set) if !set.is_empty() => task.priority.is_some_and(|p| set.contains(&p)),
            _ => true,
        }
    }

    fn matches_tags(&self, task: &Task) -> bool {
        match self.tags.as_deref() {
            Some(set) if !set.is_empty() => set.iter().any(|tag| task.has_tag(tag)),
            _ => true,
        }
    }

    fn matches_date_range(&self, task: &Task) -> bool {
        self.date_range
            .is_none_or(|range| range.contains(task.created_at))
    }

    fn matches_search(&self, task: &Task) -> bool {
        let Some(query) = self.search_query.as_deref().map(str::trim) else {
            return true;
        };
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        task.title.to_lowercase().contains(&query)
            || task.description.to_lowercase().contains(&query)
            || task
                .tags
                .iter()
                .flatten()
                .any(|tag| tag.to_lowercase().contains(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTaskPayload, TaskId};
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap()
    }

    fn task(
        id: &str,
        status: TaskStatus,
        priority: Option<Priority>,
        tags: &[&str],
        created: u32,
    ) -> Task {
        let payload = CreateTaskPayload {
            description: format!("notes for {id}"),
            priority,
            tags: (!tags.is_empty()).then(|| tags.iter().map(|t| t.to_string()).collect()),
            ..CreateTaskPayload::new(format!("Task {id}"), status)
        };
        Task::create(TaskId::new(id), payload, day(created)).unwrap()
    }

    #[fixture]
    fn tasks() -> Vec<Task> {
        vec![
            task("a", TaskStatus::Done, Some(Priority::High), &["work"], 1),
            task("b", TaskStatus::Done, Some(Priority::Low), &["home"], 2),
            task("c", TaskStatus::Working, Some(Priority::High), &["Work", "urgent"], 3),
            task("d", TaskStatus::Done, None, &[], 4),
        ]
    }

    fn kept(tasks: &[Task], filters: &TaskFilters) -> Vec<String> {
        tasks
            .iter()
            .filter(|t| filters.matches(t))
            .map(|t| t.id.to_string())
            .collect()
    }

    #[rstest]
    fn no_filters_keep_everything(tasks: Vec<Task>) {
        assert_eq!(kept(&tasks, &TaskFilters::default()).len(), 4);
    }

    #[rstest]
    fn chained_filters_equal_combined_predicate(tasks: Vec<Task>) {
        let by_status = TaskFilters {
            status: Some(vec![TaskStatus::Done]),
            ..TaskFilters::default()
        };
        let by_priority = TaskFilters {
            priority: Some(vec![Priority::High]),
            ..TaskFilters::default()
        };
        let chained: Vec<Task> = tasks
            .iter()
            .filter(|t| by_status.matches(t))
            .filter(|t| by_priority.matches(t))
            .cloned()
            .collect();

        let combined = TaskFilters {
            status: Some(vec![TaskStatus::Done]),
            priority: Some(vec![Priority::High]),
            ..TaskFilters::default()
        };
        assert_eq!(kept(&chained, &TaskFilters::default()), kept(&tasks, &combined));
        assert_eq!(kept(&tasks, &combined), vec!["a"]);
    }

    #[rstest]
    fn priority_filter_drops_tasks_without_priority(tasks: Vec<Task>) {
        let filters = TaskFilters {
            priority: Some(Priority::ALL.to_vec()),
            ..TaskFilters::default()
        };
        assert_eq!(kept(&tasks, &filters), vec!["a", "b", "c"]);
    }

    #[rstest]
    #[case::exact_match(vec!["work"], vec!["a"])]
    #[case::any_of(vec!["home", "urgent"], vec!["b", "c"])]
    #[case::empty_set_is_no_constraint(vec![], vec!["a", "b", "c", "d"])]
    fn tag_filter_matches_any(tasks: Vec<Task>, #[case] tags: Vec<&str>, #[case] expected: Vec<&str>) {
        let filters = TaskFilters {
            tags: Some(tags.into_iter().map(String::from).collect()),
            ..TaskFilters::default()
        };
        assert_eq!(kept(&tasks, &filters), expected);
    }

    #[rstest]
    fn date_range_is_inclusive(tasks: Vec<Task>) {
        let filters = TaskFilters {
            date_range: Some(DateRange::new(day(2), day(3))),
            ..TaskFilters::default()
        };
        assert_eq!(kept(&tasks, &filters), vec!["b", "c"]);
    }

    #[rstest]
    #[case::title("TASK A", vec!["a"])]
    #[case::description("notes for d", vec!["d"])]
    #[case::tag_substring("urg", vec!["c"])]
    #[case::tag_case_insensitive("WORK", vec!["a", "c"])]
    #[case::blank_query("   ", vec!["a", "b", "c", "d"])]
    fn search_checks_title_description_and_tags(
        tasks: Vec<Task>,
        #[case] query: &str,
        #[case] expected: Vec<&str>,
    ) {
        let filters = TaskFilters {
            search_query: Some(query.to_string()),
            ..TaskFilters::default()
        };
        assert_eq!(kept(&tasks, &filters), expected);
    }
}

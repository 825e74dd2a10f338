//! FilterState - セッション中のフィルタと並び順
//!
//! setter は空の選択を「フィルタなし」に正規化します。
//! 永続化はしません。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::filter::{DateRange, TaskFilters};
use super::sort::{SortDirection, SortField, SortOptions};
use super::apply;
use crate::domain::{Priority, Task, TaskStatus};

/// `FilterState::clear` の対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Status,
    Priority,
    Tags,
    DateRange,
    SearchQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    filters: TaskFilters,
    sort: SortOptions,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &TaskFilters {
        &self.filters
    }

    pub fn sort_options(&self) -> SortOptions {
        self.sort
    }

    pub fn set_status_filter(&mut self, statuses: impl IntoIterator<Item = TaskStatus>) {
        self.filters.status = non_empty(statuses.into_iter().collect());
    }

    pub fn set_priority_filter(&mut self, priorities: impl IntoIterator<Item = Priority>) {
        self.filters.priority = non_empty(priorities.into_iter().collect());
    }

    pub fn set_tag_filter<S: Into<String>>(&mut self, tags: impl IntoIterator<Item = S>) {
        self.filters.tags = non_empty(tags.into_iter().map(Into::into).collect());
    }

    pub fn set_date_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.filters.date_range = Some(DateRange::new(start, end));
    }

    pub fn set_search_query(&mut self, query: &str) {
        let query = query.trim();
        self.filters.search_query = (!query.is_empty()).then(|| query.to_string());
    }

    pub fn set_sort_field(&mut self, field: SortField) {
        self.sort.field = field;
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.sort.direction = direction;
    }

    pub fn toggle_sort_direction(&mut self) {
        self.sort.direction = self.sort.direction.toggled();
    }

    pub fn clear_all(&mut self) {
        self.filters = TaskFilters::default();
    }

    pub fn clear(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::Status => self.filters.status = None,
            FilterKind::Priority => self.filters.priority = None,
            FilterKind::Tags => self.filters.tags = None,
            FilterKind::DateRange => self.filters.date_range = None,
            FilterKind::SearchQuery => self.filters.search_query = None,
        }
    }

    pub fn has_active_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// 絞り込み・並べ替え後の一覧
    pub fn visible(&self, tasks: &[Task]) -> Vec<Task> {
        apply(tasks, &self.filters, self.sort)
    }

    /// 全タスクのタグ（重複なし、昇順）
    pub fn available_tags(tasks: &[Task]) -> Vec<String> {
        tasks
            .iter()
            .flat_map(|t| t.tags.iter().flatten())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

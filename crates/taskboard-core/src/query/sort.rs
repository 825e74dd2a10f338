//! Sort - 単一項目での安定ソート
//!
//! # 学習ポイント
//! - 値の無いタスクは昇順・降順どちらでも末尾
//! - 文字列は小文字化して比較。status と priority も wire 上の文字列として比べる
//! - `sort_by` は安定ソートなので、同じキーのタスクは入力順を保つ

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{StoreError, Task};

/// 並べ替えに使える項目（名前は wire 上の表記）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Id,
    Title,
    Description,
    Status,
    Priority,
    CreatedAt,
    UpdatedAt,
    DueDate,
    EstimatedTime,
    ActualTime,
}

impl SortField {
    pub const ALL: [SortField; 10] = [
        SortField::Id,
        SortField::Title,
        SortField::Description,
        SortField::Status,
        SortField::Priority,
        SortField::CreatedAt,
        SortField::UpdatedAt,
        SortField::DueDate,
        SortField::EstimatedTime,
        SortField::ActualTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Status => "status",
            SortField::Priority => "priority",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::DueDate => "dueDate",
            SortField::EstimatedTime => "estimatedTime",
            SortField::ActualTime => "actualTime",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| StoreError::invalid_format(format!("unknown sort field `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(StoreError::invalid_format(format!("unknown sort direction `{other}`"))),
        }
    }
}

/// 既定は更新日時の新しい順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            field: SortField::UpdatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortOptions {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// `sort_tasks` が使う比較
    ///
    /// 値が無ければどちらの向きでも後ろ。列挙値は wire 上の文字列として比較するので、
    /// priority の昇順は `high, low, medium` になる。
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let dir = self.direction;
        match self.field {
            SortField::Id => by_text(a.id.as_str(), b.id.as_str(), dir),
            SortField::Title => by_text(&a.title, &b.title, dir),
            SortField::Description => by_text(&a.description, &b.description, dir),
            SortField::Status => by_text(a.status.as_str(), b.status.as_str(), dir),
            SortField::Priority => by_optional(
                a.priority.map(|p| p.as_str().to_lowercase()),
                b.priority.map(|p| p.as_str().to_lowercase()),
                dir,
            ),
            SortField::CreatedAt => dir.apply(a.created_at.cmp(&b.created_at)),
            SortField::UpdatedAt => dir.apply(a.updated_at.cmp(&b.updated_at)),
            SortField::DueDate => by_optional(a.due_date, b.due_date, dir),
            SortField::EstimatedTime => by_optional(a.estimated_time, b.estimated_time, dir),
            SortField::ActualTime => by_optional(a.actual_time, b.actual_time, dir),
        }
    }
}

fn by_text(a: &str, b: &str, dir: SortDirection) -> Ordering {
    dir.apply(a.to_lowercase().cmp(&b.to_lowercase()))
}

fn by_optional<T: Ord>(a: Option<T>, b: Option<T>, dir: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => dir.apply(a.cmp(&b)),
    }
}

/// その場で安定ソートする。同じキーは入力順のまま
pub fn sort_tasks(tasks: &mut [Task], options: SortOptions) {
    tasks.sort_by(|a, b| options.compare(a, b));
}

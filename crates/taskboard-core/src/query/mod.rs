//! Query - 絞り込みと並べ替え
//!
//! (タスク一覧, フィルタ, 並び順) → 並んだ一覧 の純関数です。
//! ストアにも状態にも触れません。

pub mod filter;
pub mod sort;
pub mod state;

pub use self::filter::{DateRange, TaskFilters};
pub use self::sort::{SortDirection, SortField, SortOptions, sort_tasks};
pub use self::state::{FilterKind, FilterState};

use crate::domain::{Task, TaskStatus};

/// フィルタを AND で適用し、安定ソートした新しい一覧を返す
pub fn apply(tasks: &[Task], filters: &TaskFilters, sort: SortOptions) -> Vec<Task> {
    let mut kept: Vec<Task> = tasks.iter().filter(|t| filters.matches(t)).cloned().collect();
    sort_tasks(&mut kept, sort);
    kept
}

/// 列の順に振り分ける。各列の中の順序は入力のまま。
pub fn group_by_status(tasks: &[Task]) -> Vec<(TaskStatus, Vec<Task>)> {
    TaskStatus::ALL
        .into_iter()
        .map(|status| {
            let column = tasks.iter().filter(|t| t.status == status).cloned().collect();
            (status, column)
        })
        .collect()
}

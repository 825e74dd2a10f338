//! Stats - ボードの集計

use serde::{Deserialize, Serialize};

use crate::domain::{Task, TaskStatus};

/// 列ごとの件数と、見積もり・実績時間の合計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total: usize,
    pub thing_to_do: usize,
    pub working: usize,
    pub wait: usize,
    pub done: usize,
    pub resources: usize,
    pub shortcut: usize,
    /// 分
    pub estimated_minutes: u64,
    /// 分
    pub actual_minutes: u64,
}

impl BoardStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = BoardStats {
            total: tasks.len(),
            ..BoardStats::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::ThingToDo => stats.thing_to_do += 1,
                TaskStatus::Working => stats.working += 1,
                TaskStatus::Wait => stats.wait += 1,
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Resources => stats.resources += 1,
                TaskStatus::Shortcut => stats.shortcut += 1,
            }
            stats.estimated_minutes += u64::from(task.estimated_time.unwrap_or(0));
            stats.actual_minutes += u64::from(task.actual_time.unwrap_or(0));
        }
        stats
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::ThingToDo => self.thing_to_do,
            TaskStatus::Working => self.working,
            TaskStatus::Wait => self.wait,
            TaskStatus::Done => self.done,
            TaskStatus::Resources => self.resources,
            TaskStatus::Shortcut => self.shortcut,
        }
    }

    /// done / total。空のボードでは 0.0
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.done as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTaskPayload, TaskId};
    use chrono::Utc;

    fn task(id: &str, status: TaskStatus, estimated: Option<u32>) -> Task {
        let payload = CreateTaskPayload {
            estimated_time: estimated,
            ..CreateTaskPayload::new(id, status)
        };
        Task::create(TaskId::new(id), payload, Utc::now()).unwrap()
    }

    #[test]
    fn counts_by_column() {
        let tasks = vec![
            task("a", TaskStatus::Done, Some(30)),
            task("b", TaskStatus::Done, None),
            task("c", TaskStatus::Working, Some(15)),
            task("d", TaskStatus::Shortcut, None),
        ];

        let stats = BoardStats::from_tasks(&tasks);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(TaskStatus::Done), 2);
        assert_eq!(stats.count(TaskStatus::Wait), 0);
        assert_eq!(stats.estimated_minutes, 45);
        assert!((stats.completion_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_board_has_zero_completion() {
        assert_eq!(BoardStats::from_tasks(&[]).completion_rate(), 0.0);
    }
}

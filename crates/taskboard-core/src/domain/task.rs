//! Task - タスク本体と作成・更新ペイロード
//!
//! # 学習ポイント
//! - wire 形式は camelCase、日時は `toISOString()` 互換の文字列
//! - 更新は「ペイロードにある項目だけ上書き」のマージ
//! - `updatedAt` は必ず前に進む（時計が戻っても 1ms 進める）

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{StoreError, TaskId};

/// TaskStatus はタスクの状態で、そのままボードの列のキーになる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    ThingToDo,
    Working,
    Wait,
    Done,
    Resources,
    Shortcut,
}

impl TaskStatus {
    /// ボード上の列の並び順
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::ThingToDo,
        TaskStatus::Working,
        TaskStatus::Wait,
        TaskStatus::Done,
        TaskStatus::Resources,
        TaskStatus::Shortcut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ThingToDo => "thing_to_do",
            TaskStatus::Working => "working",
            TaskStatus::Wait => "wait",
            TaskStatus::Done => "done",
            TaskStatus::Resources => "resources",
            TaskStatus::Shortcut => "shortcut",
        }
    }

    /// 列の見出し
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::ThingToDo => "To Do",
            TaskStatus::Working => "Working",
            TaskStatus::Wait => "Wait",
            TaskStatus::Done => "Done",
            TaskStatus::Resources => "Resources",
            TaskStatus::Shortcut => "Shortcut",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::invalid_format(format!("unknown status `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| StoreError::invalid_format(format!("unknown priority `{s}`")))
    }
}

/// Task は永続化されるタスクのレコード
///
/// 日時は wire 上では ISO-8601 文字列（ミリ秒精度）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iso8601::option")]
    pub due_date: Option<DateTime<Utc>>,
    /// 分
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    /// 分
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<u32>,
}

/// 作成ペイロード（id と日時はストアが付与する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iso8601::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
}

impl CreateTaskPayload {
    pub fn new(title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status,
            priority: None,
            tags: None,
            due_date: None,
            estimated_time: None,
        }
    }
}

/// 部分更新ペイロード
///
/// `None` は「保存済みの値を残す」。項目が無いのと空なのは同じ扱いなので、
/// update で任意項目を消すことはできません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iso8601::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<u32>,
}

impl UpdateTaskPayload {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            title: None,
            description: None,
            status: None,
            priority: None,
            tags: None,
            due_date: None,
            estimated_time: None,
            actual_time: None,
        }
    }

    /// 列間のドラッグで発行される、status だけのペイロード
    pub fn status(id: TaskId, status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::new(id)
        }
    }

    /// id 以外に何も持たないとき true
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.due_date.is_none()
            && self.estimated_time.is_none()
            && self.actual_time.is_none()
    }
}

impl Task {
    /// 新規レコードを作る。`created_at == updated_at == now`
    pub fn create(
        id: TaskId,
        payload: CreateTaskPayload,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        ensure_title(&payload.title)?;
        let now = now.trunc_subsecs(3);
        Ok(Self {
            id,
            title: payload.title,
            description: payload.description,
            status: payload.status,
            created_at: now,
            updated_at: now,
            priority: payload.priority,
            tags: payload.tags,
            due_date: payload.due_date,
            estimated_time: payload.estimated_time,
            actual_time: None,
        })
    }

    /// 部分更新をこのレコードにマージする
    ///
    /// ペイロードに無い項目は保存済みの値のまま。`id` と `created_at` は変わらない。
    /// 空のペイロードでも `updated_at` は進む。
    pub fn merged(&self, payload: UpdateTaskPayload, now: DateTime<Utc>) -> Result<Self, StoreError> {
        if let Some(title) = &payload.title {
            ensure_title(title)?;
        }
        Ok(Self {
            id: self.id.clone(),
            title: payload.title.unwrap_or_else(|| self.title.clone()),
            description: payload
                .description
                .unwrap_or_else(|| self.description.clone()),
            status: payload.status.unwrap_or(self.status),
            created_at: self.created_at,
            updated_at: self.next_stamp(now),
            priority: payload.priority.or(self.priority),
            tags: payload.tags.or_else(|| self.tags.clone()),
            due_date: payload.due_date.or(self.due_date),
            estimated_time: payload.estimated_time.or(self.estimated_time),
            actual_time: payload.actual_time.or(self.actual_time),
        })
    }

    /// 次の `updated_at`: 基本は `now`、ただし直前の値 + 1ms より前にはしない
    fn next_stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let floor = self.updated_at.max(self.created_at) + TimeDelta::milliseconds(1);
        now.trunc_subsecs(3).max(floor)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_deref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }
}

fn ensure_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::invalid_format("title must not be empty"));
    }
    Ok(())
}

/// `toISOString()` 互換のシリアライズ（ミリ秒精度、`Z` 終端）
///
/// 読み込みは寛容: RFC 3339 のほか、タイムゾーン無しの日時と日付だけ
/// （`2024-05-10`、UTC の 0 時とみなす）も受け付ける
pub(crate) mod iso8601 {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    fn parse_or_error<E: serde::de::Error>(raw: &str) -> Result<DateTime<Utc>, E> {
        parse(raw).ok_or_else(|| E::custom(format!("invalid timestamp `{raw}`")))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_or_error(&raw)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|raw| parse_or_error(&raw)).transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn sample() -> Task {
        let payload = CreateTaskPayload {
            title: "Write report".into(),
            description: "<p>quarterly</p>".into(),
            status: TaskStatus::Working,
            priority: Some(Priority::High),
            tags: Some(vec!["work".into(), "writing".into()]),
            due_date: Some(at(20)),
            estimated_time: Some(90),
        };
        Task::create(TaskId::new("t1"), payload, at(9)).unwrap()
    }

    #[test]
    fn create_sets_both_timestamps_to_now() {
        let task = sample();
        assert_eq!(task.created_at, at(9));
        assert_eq!(task.updated_at, at(9));
        assert_eq!(task.actual_time, None);
    }

    #[test]
    fn create_rejects_blank_title() {
        let err = Task::create(
            TaskId::new("t1"),
            CreateTaskPayload::new("   ", TaskStatus::Wait),
            at(9),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat(_)));
    }

    #[test]
    fn empty_payload_only_moves_updated_at() {
        let task = sample();
        let merged = task.merged(UpdateTaskPayload::new(task.id.clone()), at(10)).unwrap();

        assert_eq!(merged.updated_at, at(10));
        assert_eq!(
            Task {
                updated_at: task.updated_at,
                ..merged
            },
            task
        );
    }

    #[rstest]
    #[case::title(UpdateTaskPayload { title: Some("New".into()), ..UpdateTaskPayload::new("t1".into()) })]
    #[case::status(UpdateTaskPayload::status("t1".into(), TaskStatus::Done))]
    #[case::tags(UpdateTaskPayload { tags: Some(vec![]), ..UpdateTaskPayload::new("t1".into()) })]
    #[case::actual(UpdateTaskPayload { actual_time: Some(45), ..UpdateTaskPayload::new("t1".into()) })]
    fn omitted_fields_survive(#[case] payload: UpdateTaskPayload) {
        let task = sample();
        let merged = task.merged(payload.clone(), at(10)).unwrap();

        if payload.title.is_none() {
            assert_eq!(merged.title, task.title);
        }
        if payload.status.is_none() {
            assert_eq!(merged.status, task.status);
        }
        if payload.tags.is_none() {
            assert_eq!(merged.tags, task.tags);
        }
        assert_eq!(merged.description, task.description);
        assert_eq!(merged.priority, task.priority);
        assert_eq!(merged.due_date, task.due_date);
        assert_eq!(merged.estimated_time, task.estimated_time);
        assert_eq!(merged.created_at, task.created_at);
        assert_eq!(merged.id, task.id);
    }

    #[test]
    fn updated_at_moves_forward_even_when_clock_does_not() {
        let task = sample();
        let first = task.merged(UpdateTaskPayload::new(task.id.clone()), at(9)).unwrap();
        let second = first.merged(UpdateTaskPayload::new(task.id.clone()), at(8)).unwrap();

        assert!(first.updated_at > task.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn merge_rejects_blank_title() {
        let task = sample();
        let payload = UpdateTaskPayload {
            title: Some(String::new()),
            ..UpdateTaskPayload::new(task.id.clone())
        };
        assert!(task.merged(payload, at(10)).is_err());
    }

    #[test]
    fn wire_format_uses_camel_case_and_iso_strings() {
        let task = sample();
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["status"], "working");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["createdAt"], "2024-01-01T09:00:00.000Z");
        assert_eq!(json["estimatedTime"], 90);
        assert!(json.get("actualTime").is_none());
    }

    #[rstest]
    #[case("thing_to_do", TaskStatus::ThingToDo)]
    #[case("shortcut", TaskStatus::Shortcut)]
    fn status_parses_wire_names(#[case] raw: &str, #[case] expected: TaskStatus) {
        assert_eq!(raw.parse::<TaskStatus>().unwrap(), expected);
    }

    #[rstest]
    #[case::rfc3339("2024-05-10T08:30:00.000Z", 8, 30)]
    #[case::offset("2024-05-10T17:30:00+09:00", 8, 30)]
    #[case::no_zone("2024-05-10T08:30:00", 8, 30)]
    #[case::date_only("2024-05-10", 0, 0)]
    fn timestamps_parse_leniently(#[case] raw: &str, #[case] hour: u32, #[case] minute: u32) {
        let expected = Utc.with_ymd_and_hms(2024, 5, 10, hour, minute, 0).unwrap();
        assert_eq!(iso8601::parse(raw), Some(expected));
    }

    #[test]
    fn date_only_due_date_deserializes() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "title": "Plan",
            "status": "wait",
            "createdAt": "2024-01-01T09:00:00.000Z",
            "updatedAt": "2024-01-01T09:00:00.000Z",
            "dueDate": "2024-05-10",
        }))
        .unwrap();
        assert_eq!(task.due_date, Some(Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap()));
        assert_eq!(iso8601::parse("next week"), None);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("archived".parse::<TaskStatus>().is_err());
        assert!(serde_json::from_str::<TaskStatus>("\"archived\"").is_err());
    }
}

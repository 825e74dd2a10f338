//! Snapshot - export / import で使う版付き JSON 封筒
//!
//! # 学習ポイント
//! - export は `{version, exportDate, tasks}` の封筒、key-value バックエンドが保存するのは素の配列
//! - import の検証は構造だけ: 必須 5 項目（id, title, status, createdAt, updatedAt）が揃っていれば採用
//! - 任意項目は寛容に読む。読めない値は「無い」ものとして扱い、レコードは捨てない

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::task::iso8601;
use super::{Priority, StoreError, Task, TaskId, TaskStatus};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub version: String,
    #[serde(with = "iso8601")]
    pub export_date: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl ExportSnapshot {
    pub fn new(tasks: Vec<Task>, export_date: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            export_date,
            tasks,
        }
    }

    /// 2 スペースインデントの JSON
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// import ペイロードを解析・検証する
///
/// `tasks` 配列を持つ JSON でなければ `InvalidFormat`。
/// 各レコードは空でない `id` と `title`、既知の `status`、読める `createdAt` /
/// `updatedAt` を持つものだけ採用し、同じ id が再登場したら先勝ち。
pub fn parse_snapshot(text: &str) -> Result<Vec<Task>, StoreError> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::invalid_format(format!("import is not JSON: {e}")))?;

    let Some(records) = parsed.get("tasks").and_then(Value::as_array) else {
        return Err(StoreError::invalid_format("expected a `tasks` array"));
    };

    let total = records.len();
    let mut seen = HashSet::new();
    let accepted: Vec<Task> = records
        .iter()
        .filter_map(accept_record)
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    if accepted.len() < total {
        debug!(total, accepted = accepted.len(), "dropped malformed task records");
    }
    Ok(accepted)
}

fn accept_record(record: &Value) -> Option<Task> {
    let fields = record.as_object()?;
    let id = non_empty_str(fields, "id")?;
    let title = non_empty_str(fields, "title")?;
    let status: TaskStatus = fields.get("status")?.as_str()?.parse().ok()?;
    let created_at = timestamp(fields, "createdAt")?;
    let updated_at = timestamp(fields, "updatedAt")?;

    Some(Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: fields
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        status,
        created_at,
        updated_at,
        priority: fields
            .get("priority")
            .and_then(Value::as_str)
            .and_then(|raw| raw.trim().to_lowercase().parse::<Priority>().ok()),
        tags: fields.get("tags").and_then(Value::as_array).map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }),
        due_date: timestamp(fields, "dueDate"),
        estimated_time: minutes(fields, "estimatedTime"),
        actual_time: minutes(fields, "actualTime"),
    })
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key)?.as_str().filter(|s| !s.trim().is_empty())
}

fn timestamp(fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    iso8601::parse(fields.get(key)?.as_str()?)
}

/// 数値・数値文字列を分として読む。小数は四捨五入、負数や範囲外は捨てる
fn minutes(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    let value = match fields.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let rounded = value.round();
    (rounded.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&rounded))
        .then_some(rounded as u32)
}

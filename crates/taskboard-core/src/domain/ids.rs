//! Task identifiers.
//!
//! # ULID ベースの ID
//! 新規に発行する ID は ULID (Universally Unique Lexicographically Sortable Identifier)
//! に `task-` プレフィックスを付けた文字列です。
//!
//! ただし import で取り込むデータには別のシステムが発行した ID（UUID など）が
//! 含まれることがあるため、`TaskId` 自体は不透明な文字列として扱います。
//! 形式を解釈するのは生成時だけです。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// 生成した ID に付けるプレフィックス
const PREFIX: &str = "task-";

/// Identifier of a task on the board.
///
/// Immutable once assigned by the store; compared and hashed as an opaque string.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// ULID から新しい ID を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{PREFIX}{ulid}"))
    }

    /// 既存の文字列をそのまま ID として扱う（import / CLI 引数用）
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 生成元の ULID を取り出す。外部由来の ID では `None`。
    pub fn as_ulid(&self) -> Option<Ulid> {
        self.0
            .strip_prefix(PREFIX)
            .and_then(|raw| Ulid::from_string(raw).ok())
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix_and_ulid() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);

        assert!(id.to_string().starts_with("task-"));
        assert_eq!(id.as_ulid(), Some(ulid));
    }

    #[test]
    fn foreign_ids_are_kept_verbatim() {
        let id = TaskId::new("3f0c2a7e-3d2b-4a53-9a57-2a4a2b3c9d10");

        assert_eq!(id.as_str(), "3f0c2a7e-3d2b-4a53-9a57-2a4a2b3c9d10");
        assert_eq!(id.as_ulid(), None);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TaskId::new("abc");

        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"abc\"");

        let deserialized: TaskId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}

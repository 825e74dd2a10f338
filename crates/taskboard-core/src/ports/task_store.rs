//! TaskStore port - タスク永続化の契約
//!
//! 3 つのバックエンド（構造化 DB / key-value / メモリ）がこの trait を実装し、
//! 起動時に `app::selector` が 1 つだけ選びます。
//!
//! # 設計原則
//! - 各呼び出しはそれ自身に対してのみアトミック（同一 ID への複数呼び出しの直列化はしない）
//! - `get_task` の「見つからない」はエラーではなく `None`
//! - `delete_task` の「見つからない」もエラーではなく `false`

use async_trait::async_trait;

use crate::domain::{CreateTaskPayload, StoreError, Task, TaskId, UpdateTaskPayload};

/// TaskStore は Task コレクションの正本
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// 全件取得（順序は保証しない）
    async fn get_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// 新しい ID と `created_at == updated_at == now` を付与して保存
    async fn create_task(&self, payload: CreateTaskPayload) -> Result<Task, StoreError>;

    /// 部分更新。存在しない ID は `StoreError::NotFound`
    async fn update_task(&self, payload: UpdateTaskPayload) -> Result<Task, StoreError>;

    /// 削除できたら `true`
    async fn delete_task(&self, id: &TaskId) -> Result<bool, StoreError>;

    async fn clear_tasks(&self) -> Result<bool, StoreError>;

    /// `{version, exportDate, tasks}` 形式の JSON 文字列
    async fn export_tasks(&self) -> Result<String, StoreError>;

    /// コレクション全体を検証済みの import 結果で置き換え、受け入れたレコードを返す
    async fn import_tasks(&self, data: &str) -> Result<Vec<Task>, StoreError>;
}

//! KeyValueTaskStore - 1 つの JSON blob に全タスクを保存する fallback
//!
//! # 実装詳細
//! - 固定キー `STORAGE_KEY` にタスク配列をそのまま JSON で保存（export 形式の封筒は付けない）
//! - すべての操作は「全体を読む → メモリ上で変更 → 全体を書き戻す」
//! - 書き込み失敗（容量超過など）は `StoreError::Storage` として必ず伝播する
//! - 面からの読み込み失敗も `StoreError::Storage`。空として扱うと次の書き込みで全件消えるため
//! - 壊れた blob は読むだけの操作では空扱い、読んでから書く操作はエラーにして上書きしない
//! - import と clear は blob を丸ごと置き換えるので読まない
//!
//! # 並行性
//! read-modify-write の間にロックは取らないため、同時に 2 つの書き込みが走ると
//! 後勝ちになります。best-effort であって linearizable ではありません。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::StoreContext;
use crate::domain::{
    CreateTaskPayload, ExportSnapshot, StoreError, Task, TaskId, UpdateTaskPayload,
    parse_snapshot,
};
use crate::ports::{KeyValueSurface, KvError, TaskStore};

/// タスク配列を保存する固定キー
pub const STORAGE_KEY: &str = "taskboard_tasks";

pub struct KeyValueTaskStore {
    surface: Arc<dyn KeyValueSurface>,
    ctx: StoreContext,
}

impl KeyValueTaskStore {
    pub fn new(surface: Arc<dyn KeyValueSurface>) -> Self {
        Self::with_context(surface, StoreContext::default())
    }

    pub fn with_context(surface: Arc<dyn KeyValueSurface>, ctx: StoreContext) -> Self {
        Self { surface, ctx }
    }

    /// blob を読む。面の読み込み失敗は `Err`、JSON として壊れていれば `Ok(Err(_))`
    fn read_blob(&self) -> Result<Result<Vec<Task>, serde_json::Error>, StoreError> {
        let raw = self.surface.get_item(STORAGE_KEY).map_err(|e| {
            warn!(error = %e, "failed to read tasks from key-value storage");
            StoreError::storage(e)
        })?;
        Ok(match raw {
            Some(raw) => serde_json::from_str(&raw),
            None => Ok(Vec::new()),
        })
    }

    /// 読むだけの操作向け: 壊れた blob は空コレクションとして扱う
    fn load(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.read_blob()?.unwrap_or_else(|e| {
            warn!(error = %e, "failed to parse tasks from key-value storage");
            Vec::new()
        }))
    }

    /// 書き戻す前の読み込み: 壊れた blob は上書きせずエラーにする
    fn load_for_write(&self) -> Result<Vec<Task>, StoreError> {
        self.read_blob()?.map_err(|e| {
            warn!(error = %e, "refusing to overwrite corrupt key-value blob");
            StoreError::storage(format!("stored tasks are corrupt: {e}"))
        })
    }

    fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(tasks)?;
        self.surface
            .set_item(STORAGE_KEY, &raw)
            .map_err(kv_to_store_error)
    }
}

fn kv_to_store_error(err: KvError) -> StoreError {
    warn!(error = %err, "failed to save tasks to key-value storage");
    StoreError::storage(err)
}

#[async_trait]
impl TaskStore for KeyValueTaskStore {
    async fn get_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.load()
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.load()?.into_iter().find(|t| &t.id == id))
    }

    #[instrument(skip(self, payload), fields(status = %payload.status))]
    async fn create_task(&self, payload: CreateTaskPayload) -> Result<Task, StoreError> {
        let task = Task::create(self.ctx.ids.generate_task_id(), payload, self.ctx.clock.now())?;
        let mut tasks = self.load_for_write()?;
        tasks.push(task.clone());
        self.save(&tasks)?;
        debug!(task_id = %task.id, "kv: created task");
        Ok(task)
    }

    #[instrument(skip(self, payload), fields(task_id = %payload.id))]
    async fn update_task(&self, payload: UpdateTaskPayload) -> Result<Task, StoreError> {
        let mut tasks = self.load_for_write()?;
        let Some(index) = tasks.iter().position(|t| t.id == payload.id) else {
            return Err(StoreError::NotFound(payload.id));
        };
        let updated = tasks[index].merged(payload, self.ctx.clock.now())?;
        tasks[index] = updated.clone();
        self.save(&tasks)?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete_task(&self, id: &TaskId) -> Result<bool, StoreError> {
        let tasks = self.load_for_write()?;
        let before = tasks.len();
        let remaining: Vec<Task> = tasks.into_iter().filter(|t| &t.id != id).collect();
        if remaining.len() == before {
            return Ok(false);
        }
        self.save(&remaining)?;
        Ok(true)
    }

    async fn clear_tasks(&self) -> Result<bool, StoreError> {
        self.surface
            .remove_item(STORAGE_KEY)
            .map_err(kv_to_store_error)?;
        Ok(true)
    }

    async fn export_tasks(&self) -> Result<String, StoreError> {
        ExportSnapshot::new(self.load()?, self.ctx.clock.now()).to_json()
    }

    #[instrument(skip(self, data))]
    async fn import_tasks(&self, data: &str) -> Result<Vec<Task>, StoreError> {
        let accepted = parse_snapshot(data)?;
        self.save(&accepted)?;
        debug!(count = accepted.len(), "kv: imported tasks");
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::impls::MemoryKeyValue;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 読み込みだけを途中から失敗させられる面
    #[derive(Default)]
    struct UnreadableKeyValue {
        inner: MemoryKeyValue,
        fail_reads: AtomicBool,
    }

    impl KeyValueSurface for UnreadableKeyValue {
        fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(KvError::Io(std::io::Error::other("read failed")));
            }
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), KvError> {
            self.inner.remove_item(key)
        }
    }

    fn stored_titles(surface: &UnreadableKeyValue) -> Vec<String> {
        let raw = surface.inner.get_item(STORAGE_KEY).unwrap().unwrap();
        let tasks: Vec<Task> = serde_json::from_str(&raw).unwrap();
        tasks.into_iter().map(|t| t.title).collect()
    }

    #[tokio::test]
    async fn blob_is_a_bare_array_under_fixed_key() {
        let surface = Arc::new(MemoryKeyValue::new());
        let store = KeyValueTaskStore::new(surface.clone());
        store
            .create_task(CreateTaskPayload::new("a", TaskStatus::Working))
            .await
            .unwrap();

        let raw = surface.get_item(STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["title"], "a");
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty_but_is_not_overwritten() {
        let surface = Arc::new(MemoryKeyValue::new());
        surface.set_item(STORAGE_KEY, "{not json").unwrap();
        let store = KeyValueTaskStore::new(surface.clone());

        assert!(store.get_tasks().await.unwrap().is_empty());
        assert_eq!(store.get_task(&TaskId::new("a")).await.unwrap(), None);
        assert!(store.export_tasks().await.is_ok());

        let err = store
            .create_task(CreateTaskPayload::new("d", TaskStatus::Wait))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(store.delete_task(&TaskId::new("a")).await.is_err());
        assert_eq!(surface.get_item(STORAGE_KEY).unwrap().as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn read_failure_propagates_and_keeps_stored_tasks() {
        let surface = Arc::new(UnreadableKeyValue::default());
        let store = KeyValueTaskStore::new(surface.clone());
        let mut created = Vec::new();
        for title in ["a", "b", "c"] {
            let task = store
                .create_task(CreateTaskPayload::new(title, TaskStatus::Wait))
                .await
                .unwrap();
            created.push(task);
        }

        surface.fail_reads.store(true, Ordering::SeqCst);

        let create = store
            .create_task(CreateTaskPayload::new("d", TaskStatus::Wait))
            .await;
        assert!(matches!(create, Err(StoreError::Storage(_))));
        let update = store
            .update_task(UpdateTaskPayload::status(created[0].id.clone(), TaskStatus::Done))
            .await;
        assert!(matches!(update, Err(StoreError::Storage(_))));
        assert!(matches!(store.delete_task(&created[1].id).await, Err(StoreError::Storage(_))));
        assert!(matches!(store.get_tasks().await, Err(StoreError::Storage(_))));
        assert!(matches!(store.get_task(&created[2].id).await, Err(StoreError::Storage(_))));
        assert!(matches!(store.export_tasks().await, Err(StoreError::Storage(_))));

        assert_eq!(stored_titles(&surface), vec!["a", "b", "c"]);

        surface.fail_reads.store(false, Ordering::SeqCst);
        assert_eq!(store.get_tasks().await.unwrap(), created);
    }

    #[tokio::test]
    async fn disabled_surface_is_a_storage_error() {
        let store = KeyValueTaskStore::new(Arc::new(MemoryKeyValue::disabled()));

        assert!(matches!(store.get_tasks().await, Err(StoreError::Storage(_))));
        assert!(matches!(
            store.create_task(CreateTaskPayload::new("a", TaskStatus::Wait)).await,
            Err(StoreError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn quota_exceeded_propagates_as_storage_error() {
        let surface = Arc::new(MemoryKeyValue::with_quota(400));
        let store = KeyValueTaskStore::new(surface.clone());

        let mut last = Ok(());
        for i in 0..10 {
            let result = store
                .create_task(CreateTaskPayload::new(format!("task number {i}"), TaskStatus::Wait))
                .await;
            if let Err(e) = result {
                last = Err(e);
                break;
            }
        }

        assert!(matches!(last, Err(StoreError::Storage(_))));
        // 失敗した書き込みは blob に反映されない
        let stored: Vec<Task> =
            serde_json::from_str(&surface.get_item(STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(store.get_tasks().await.unwrap(), stored);
    }
}

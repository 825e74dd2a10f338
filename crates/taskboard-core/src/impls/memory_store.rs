//! MemoryTaskStore - プロセス内のタスクストア
//!
//! 永続化できる手段が何も無いときの最後の fallback。プロセス終了で全件消えます。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::StoreContext;
use crate::domain::{
    CreateTaskPayload, ExportSnapshot, StoreError, Task, TaskId, UpdateTaskPayload,
    parse_snapshot,
};
use crate::ports::TaskStore;

/// MemoryTaskStore は挿入順を保つ。export/import を含めて契約をすべて満たす
pub struct MemoryTaskStore {
    tasks: Arc<Mutex<Vec<Task>>>,
    ctx: StoreContext,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::with_context(StoreContext::default())
    }

    pub fn with_context(ctx: StoreContext) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            ctx,
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().await.clone())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        Ok(tasks.iter().find(|t| &t.id == id).cloned())
    }

    async fn create_task(&self, payload: CreateTaskPayload) -> Result<Task, StoreError> {
        let task = Task::create(self.ctx.ids.generate_task_id(), payload, self.ctx.clock.now())?;
        self.tasks.lock().await.push(task.clone());
        debug!(task_id = %task.id, "memory: created task");
        Ok(task)
    }

    async fn update_task(&self, payload: UpdateTaskPayload) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let Some(slot) = tasks.iter_mut().find(|t| t.id == payload.id) else {
            return Err(StoreError::NotFound(payload.id));
        };
        let updated = slot.merged(payload, self.ctx.clock.now())?;
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        Ok(tasks.len() != before)
    }

    async fn clear_tasks(&self) -> Result<bool, StoreError> {
        self.tasks.lock().await.clear();
        Ok(true)
    }

    async fn export_tasks(&self) -> Result<String, StoreError> {
        let tasks = self.tasks.lock().await.clone();
        ExportSnapshot::new(tasks, self.ctx.clock.now()).to_json()
    }

    async fn import_tasks(&self, data: &str) -> Result<Vec<Task>, StoreError> {
        let accepted = parse_snapshot(data)?;
        *self.tasks.lock().await = accepted.clone();
        Ok(accepted)
    }
}

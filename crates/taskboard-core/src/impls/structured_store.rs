//! StructuredTaskStore - redb による索引付き永続ストア
//!
//! # テーブル構成
//! - `tasks`: id → Task(JSON)
//! - `by-status` / `by-created` / `by-updated`: multimap 索引（値は id）
//!
//! 索引は書き込みのたびに同じトランザクション内で更新します。
//! TaskStore の契約自体は索引を必要としませんが、列ごとの取得や
//! 最近の更新順の取得に使えます。
//!
//! # 学習ポイント
//! - redb は同期 API なので `spawn_blocking` で async から呼ぶ
//! - テーブルは WriteTransaction を借用するので commit 前に drop する

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    Database, MultimapTable, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, Table,
    TableDefinition, WriteTransaction,
};
use tracing::{debug, info, instrument};

use super::StoreContext;
use crate::domain::task::iso8601;
use crate::domain::{
    CreateTaskPayload, ExportSnapshot, StoreError, Task, TaskId, TaskStatus, UpdateTaskPayload,
    parse_snapshot,
};
use crate::ports::TaskStore;

const TASKS: TableDefinition<&str, &str> = TableDefinition::new("tasks");
const BY_STATUS: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("by-status");
const BY_CREATED: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("by-created");
const BY_UPDATED: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("by-updated");

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::storage(format!("redb: {err}"))
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub struct StructuredTaskStore {
    db: Arc<Database>,
    ctx: StoreContext,
}

impl StructuredTaskStore {
    /// データベースファイルを開く（なければ作る）。失敗したらこのバックエンドは使えない。
    pub fn open(path: impl AsRef<Path>, ctx: StoreContext) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            WriteTables::open(&write_txn)?;
        }
        write_txn.commit()?;

        info!(path = %path.display(), "opened structured task store");
        Ok(Self {
            db: Arc::new(db),
            ctx,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &StoreContext) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let ctx = self.ctx.clone();
        tokio::task::spawn_blocking(move || f(&db, &ctx))
            .await
            .map_err(|e| StoreError::storage(format!("blocking task failed: {e}")))?
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut WriteTables<'_>, &StoreContext) -> Result<T, StoreError> + Send + 'static,
    {
        self.blocking(move |db, ctx| {
            let write_txn = db.begin_write()?;
            let result = {
                let mut tables = WriteTables::open(&write_txn)?;
                f(&mut tables, ctx)?
            };
            write_txn.commit()?;
            Ok(result)
        })
        .await
    }

    /// by-status 索引を使って 1 列分のタスクを取得
    pub async fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<Task>, StoreError> {
        self.blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let tasks = read_txn.open_table(TASKS)?;
            let by_status = read_txn.open_multimap_table(BY_STATUS)?;

            let mut result: Vec<Task> = Vec::new();
            for id in by_status.get(status.as_str())? {
                let id = id?;
                if let Some(raw) = tasks.get(id.value())? {
                    result.push(serde_json::from_str(raw.value())?);
                }
            }
            Ok(result)
        })
        .await
    }

    /// by-updated 索引を逆順に辿り、更新が新しい順に最大 `limit` 件
    pub async fn recently_updated(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        self.blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let tasks = read_txn.open_table(TASKS)?;
            let by_updated = read_txn.open_multimap_table(BY_UPDATED)?;

            let mut result: Vec<Task> = Vec::new();
            'outer: for entry in by_updated.iter()?.rev() {
                let (_, ids) = entry?;
                for id in ids {
                    if result.len() >= limit {
                        break 'outer;
                    }
                    let id = id?;
                    if let Some(raw) = tasks.get(id.value())? {
                        result.push(serde_json::from_str(raw.value())?);
                    }
                }
            }
            Ok(result)
        })
        .await
    }
}

/// 1 トランザクション分の書き込み用テーブル一式
struct WriteTables<'txn> {
    tasks: Table<'txn, &'static str, &'static str>,
    by_status: MultimapTable<'txn, &'static str, &'static str>,
    by_created: MultimapTable<'txn, &'static str, &'static str>,
    by_updated: MultimapTable<'txn, &'static str, &'static str>,
}

impl<'txn> WriteTables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> Result<Self, StoreError> {
        Ok(Self {
            tasks: txn.open_table(TASKS)?,
            by_status: txn.open_multimap_table(BY_STATUS)?,
            by_created: txn.open_multimap_table(BY_CREATED)?,
            by_updated: txn.open_multimap_table(BY_UPDATED)?,
        })
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        match self.tasks.get(id.as_str())? {
            Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
            None => Ok(None),
        }
    }

    fn ids(&self) -> Result<Vec<TaskId>, StoreError> {
        let mut ids = Vec::new();
        for entry in self.tasks.iter()? {
            let (key, _) = entry?;
            ids.push(TaskId::new(key.value()));
        }
        Ok(ids)
    }

    /// 既存レコードがあれば索引ごと置き換える
    fn put(&mut self, task: &Task) -> Result<(), StoreError> {
        self.remove(&task.id)?;

        let json = serde_json::to_string(task)?;
        let id = task.id.as_str();
        let created = iso8601::format(&task.created_at);
        let updated = iso8601::format(&task.updated_at);

        self.tasks.insert(id, json.as_str())?;
        self.by_status.insert(task.status.as_str(), id)?;
        self.by_created.insert(created.as_str(), id)?;
        self.by_updated.insert(updated.as_str(), id)?;
        Ok(())
    }

    fn remove(&mut self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let previous: Option<Task> = match self.tasks.remove(id.as_str())? {
            Some(raw) => Some(serde_json::from_str(raw.value())?),
            None => None,
        };
        if let Some(task) = &previous {
            let created = iso8601::format(&task.created_at);
            let updated = iso8601::format(&task.updated_at);
            self.by_status.remove(task.status.as_str(), id.as_str())?;
            self.by_created.remove(created.as_str(), id.as_str())?;
            self.by_updated.remove(updated.as_str(), id.as_str())?;
        }
        Ok(previous)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        for id in self.ids()? {
            self.remove(&id)?;
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for StructuredTaskStore {
    async fn get_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.blocking(|db, _| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(TASKS)?;
            let mut tasks: Vec<Task> = Vec::new();
            for entry in table.iter()? {
                let (_, raw) = entry?;
                tasks.push(serde_json::from_str(raw.value())?);
            }
            Ok(tasks)
        })
        .await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let id = id.clone();
        self.blocking(move |db, _| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(TASKS)?;
            match table.get(id.as_str())? {
                Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    #[instrument(skip(self, payload), fields(status = %payload.status))]
    async fn create_task(&self, payload: CreateTaskPayload) -> Result<Task, StoreError> {
        let task = self
            .write(move |tables, ctx| {
                let task = Task::create(ctx.ids.generate_task_id(), payload, ctx.clock.now())?;
                tables.put(&task)?;
                Ok(task)
            })
            .await?;
        debug!(task_id = %task.id, "structured: created task");
        Ok(task)
    }

    #[instrument(skip(self, payload), fields(task_id = %payload.id))]
    async fn update_task(&self, payload: UpdateTaskPayload) -> Result<Task, StoreError> {
        self.write(move |tables, ctx| {
            let Some(existing) = tables.get(&payload.id)? else {
                return Err(StoreError::NotFound(payload.id));
            };
            let updated = existing.merged(payload, ctx.clock.now())?;
            tables.put(&updated)?;
            Ok(updated)
        })
        .await
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete_task(&self, id: &TaskId) -> Result<bool, StoreError> {
        let id = id.clone();
        self.write(move |tables, _| Ok(tables.remove(&id)?.is_some()))
            .await
    }

    async fn clear_tasks(&self) -> Result<bool, StoreError> {
        self.write(|tables, _| tables.clear()).await?;
        Ok(true)
    }

    async fn export_tasks(&self) -> Result<String, StoreError> {
        let tasks = self.get_tasks().await?;
        ExportSnapshot::new(tasks, self.ctx.clock.now()).to_json()
    }

    #[instrument(skip(self, data))]
    async fn import_tasks(&self, data: &str) -> Result<Vec<Task>, StoreError> {
        let accepted = parse_snapshot(data)?;
        let to_store = accepted.clone();
        self.write(move |tables, _| {
            tables.clear()?;
            for task in &to_store {
                tables.put(task)?;
            }
            Ok(())
        })
        .await?;
        debug!(count = accepted.len(), "structured: imported tasks");
        Ok(accepted)
    }
}

//! TaskBoard - ストアを包むボードの状態管理
//!
//! # 責務
//! - `loading` / `error` / `notice` を含むボード状態を `watch` で公開する
//! - CRUD 成功時にメモリ上のタスク一覧をストアと同じ形に patch する
//!   （作成は先頭に挿入、更新はその場で置換、削除は取り除く）
//! - ドラッグ&ドロップの楽観的ステータス変更とロールバック
//!
//! # エラーの扱い
//! 作成・更新・import・export は `error` を立てたうえで `Err` を返します。
//! 削除・全消去・取得・ステータス変更は呼び出し元へ返さず、状態に吸収します。
//!
//! # 楽観的ステータス変更
//! 1. 現在のステータスを覚える
//! 2. メモリ上のタスクに新しいステータスを即座に反映
//! 3. タスクごとの書き込みゲートを取り、ストアへ `{id, status}` を書く
//! 4. 失敗したら最後にストアが確定したステータスへ戻し、通知を出す
//!    （通知は `notice_ttl` 後に自動で消える）
//!
//! 同じタスクへのドラッグはゲートで直列化されます。ゲート待ちの間に新しいドラッグが
//! 来たら古いほうは書き込みを飛ばし、ロールバックは最新のドラッグだけが行います。
//!
//! # 学習ポイント
//! - `tokio::sync::watch` で状態をスナップショットとして配る
//! - `std::sync::Mutex` は await を跨がない短い区間だけに使う
//! - タスク単位のゲートは `Arc<tokio::sync::Mutex<()>>`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::seed::seed_if_empty;
use crate::config::BoardConfig;
use crate::domain::{CreateTaskPayload, StoreError, Task, TaskId, TaskStatus, UpdateTaskPayload};
use crate::impls::StoreContext;
use crate::ports::TaskStore;

/// ステータス変更失敗時に表示する文言
pub const STATUS_CHANGE_FAILED: &str = "Failed to update task status. Please try again.";

/// 一定時間で消える通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub message: String,
}

/// ビュー層に見せる状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub notice: Option<Notice>,
}

/// `on_task_status_change` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// メモリ上にそのタスクがない
    UnknownTask,
    /// 既に同じ列にある。書き込みなし。
    Unchanged,
    /// ストアが新しいステータスを確定した
    Confirmed,
    /// 新しいドラッグに追い越された。この結果の後始末はそちらが行う。
    Superseded,
    /// 書き込みに失敗し、このステータスへ戻した
    RolledBack(TaskStatus),
}

/// 進行中のドラッグの記録（タスクごと）
struct MoveSlot {
    generation: u64,
    /// 最後にストアが確定したステータス
    confirmed: TaskStatus,
    gate: Arc<tokio::sync::Mutex<()>>,
}

/// ボードのコントローラ。clone は同じ状態を共有する。
#[derive(Clone)]
pub struct TaskBoard {
    store: Arc<dyn TaskStore>,
    state: Arc<watch::Sender<BoardState>>,
    moves: Arc<Mutex<HashMap<TaskId, MoveSlot>>>,
    generations: Arc<AtomicU64>,
    notices: Arc<AtomicU64>,
    options: BoardConfig,
    ctx: StoreContext,
}

impl TaskBoard {
    pub fn new(store: Arc<dyn TaskStore>, options: BoardConfig) -> Self {
        Self::with_context(store, options, StoreContext::default())
    }

    pub fn with_context(store: Arc<dyn TaskStore>, options: BoardConfig, ctx: StoreContext) -> Self {
        let (state, _) = watch::channel(BoardState::default());
        Self {
            store,
            state: Arc::new(state),
            moves: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
            notices: Arc::new(AtomicU64::new(0)),
            options,
            ctx,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    // ---- 状態の参照 ----

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().tasks.is_empty()
    }

    pub fn count(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.state.borrow().notice.clone()
    }

    /// バナーを閉じる
    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    // ---- 読み込み ----

    /// 空なら例を入れてから、ストアの内容で一覧を置き換える
    pub async fn load(&self) {
        self.begin();
        if self.options.seed_defaults {
            let now = self.ctx.clock.now();
            if let Err(e) = seed_if_empty(self.store.as_ref(), now, self.ctx.ids.as_ref()).await {
                warn!(error = %e, "failed to seed default tasks");
            }
        }
        let result = self.store.get_tasks().await;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(tasks) => s.tasks = tasks.clone(),
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to load tasks");
        }
    }

    pub async fn refetch(&self) {
        self.load().await;
    }

    /// 取得失敗は `None` に吸収する
    pub async fn get_task(&self, id: &TaskId) -> Option<Task> {
        match self.store.get_task(id).await {
            Ok(task) => task,
            Err(e) => {
                warn!(task_id = %id, error = %e, "failed to get task");
                None
            }
        }
    }

    // ---- CRUD ----

    pub async fn create_task(&self, payload: CreateTaskPayload) -> Result<Task, StoreError> {
        self.begin();
        let result = self.store.create_task(payload).await;
        let patch = self.options.patch_local_state;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(task) if patch => s.tasks.insert(0, task.clone()),
                Ok(_) => {}
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        if let Err(e) = &result {
            warn!(error = %e, "failed to create task");
        }
        result
    }

    pub async fn update_task(&self, payload: UpdateTaskPayload) -> Result<Task, StoreError> {
        self.begin();
        let result = self.store.update_task(payload).await;
        let patch = self.options.patch_local_state;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(updated) if patch => {
                    if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == updated.id) {
                        *slot = updated.clone();
                    }
                }
                Ok(_) => {}
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        if let Err(e) = &result {
            warn!(error = %e, "failed to update task");
        }
        result
    }

    /// 削除できたら `true`。失敗は `false` と `error` に吸収する。
    pub async fn delete_task(&self, id: &TaskId) -> bool {
        self.begin();
        let result = self.store.delete_task(id).await;
        let patch = self.options.patch_local_state;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(true) if patch => s.tasks.retain(|t| &t.id != id),
                Ok(_) => {}
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        match result {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(task_id = %id, error = %e, "failed to delete task");
                false
            }
        }
    }

    /// 全消去。失敗は `false` と `error` に吸収する。
    pub async fn clear_all(&self) -> bool {
        self.begin();
        let result = self.store.clear_tasks().await;
        let patch = self.options.patch_local_state;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(true) if patch => s.tasks.clear(),
                Ok(_) => {}
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        match result {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(error = %e, "failed to clear tasks");
                false
            }
        }
    }

    pub async fn export_tasks(&self) -> Result<String, StoreError> {
        let result = self.store.export_tasks().await;
        if let Err(e) = &result {
            warn!(error = %e, "failed to export tasks");
            let message = e.to_string();
            self.state.send_modify(|s| s.error = Some(message));
        }
        result
    }

    pub async fn import_tasks(&self, data: &str) -> Result<Vec<Task>, StoreError> {
        self.begin();
        let result = self.store.import_tasks(data).await;
        let patch = self.options.patch_local_state;
        self.state.send_modify(|s| {
            s.loading = false;
            match &result {
                Ok(tasks) if patch => s.tasks = tasks.clone(),
                Ok(_) => {}
                Err(e) => s.error = Some(e.to_string()),
            }
        });
        if let Err(e) = &result {
            warn!(error = %e, "failed to import tasks");
        }
        result
    }

    // ---- 楽観的ステータス変更 ----

    /// ドラッグ&ドロップによる列移動
    #[instrument(skip_all, fields(task_id = %id, status = %status))]
    pub async fn on_task_status_change(&self, id: &TaskId, status: TaskStatus) -> MoveOutcome {
        let Some(previous) = self.local_status(id) else {
            warn!("task not found for status update");
            return MoveOutcome::UnknownTask;
        };
        if previous == status {
            return MoveOutcome::Unchanged;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let gate = {
            let mut moves = self.moves();
            let slot = moves.entry(id.clone()).or_insert_with(|| MoveSlot {
                generation,
                confirmed: previous,
                gate: Arc::new(tokio::sync::Mutex::new(())),
            });
            slot.generation = generation;
            Arc::clone(&slot.gate)
        };

        self.patch_status(id, status);

        let _permit = gate.lock().await;
        if !self.is_latest(id, generation) {
            debug!("superseded before write");
            return MoveOutcome::Superseded;
        }

        match self.store.update_task(UpdateTaskPayload::status(id.clone(), status)).await {
            Ok(_) => {
                let mut moves = self.moves();
                if let Some(slot) = moves.get_mut(id) {
                    if slot.generation == generation {
                        moves.remove(id);
                    } else {
                        slot.confirmed = status;
                    }
                }
                MoveOutcome::Confirmed
            }
            Err(e) => {
                warn!(error = %e, "failed to update task status in storage");
                let rollback = {
                    let mut moves = self.moves();
                    match moves.get(id) {
                        Some(slot) if slot.generation == generation => {
                            let confirmed = slot.confirmed;
                            moves.remove(id);
                            Some(confirmed)
                        }
                        _ => None,
                    }
                };
                match rollback {
                    Some(confirmed) => {
                        self.patch_status(id, confirmed);
                        self.raise_notice(STATUS_CHANGE_FAILED);
                        MoveOutcome::RolledBack(confirmed)
                    }
                    None => MoveOutcome::Superseded,
                }
            }
        }
    }

    // ---- 内部 ----

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn moves(&self) -> MutexGuard<'_, HashMap<TaskId, MoveSlot>> {
        self.moves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_latest(&self, id: &TaskId, generation: u64) -> bool {
        self.moves()
            .get(id)
            .is_some_and(|slot| slot.generation == generation)
    }

    fn local_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.state
            .borrow()
            .tasks
            .iter()
            .find(|t| &t.id == id)
            .map(|t| t.status)
    }

    /// メモリ上のコピーだけを書き換える
    fn patch_status(&self, id: &TaskId, status: TaskStatus) {
        let now = self.ctx.clock.now();
        self.state.send_if_modified(|s| match s.tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => {
                task.status = status;
                task.updated_at = now;
                true
            }
            None => false,
        });
    }

    /// 通知を出し、`notice_ttl` 後に消す。後から出た通知は消さない。
    fn raise_notice(&self, message: &str) {
        let seq = self.notices.fetch_add(1, Ordering::Relaxed) + 1;
        let notice = Notice {
            seq,
            message: message.to_string(),
        };
        self.state.send_modify(|s| s.notice = Some(notice));

        let state = Arc::clone(&self.state);
        let ttl = self.options.notice_ttl();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            state.send_if_modified(|s| {
                if s.notice.as_ref().is_some_and(|n| n.seq == seq) {
                    s.notice = None;
                    true
                } else {
                    false
                }
            });
        });
    }
}

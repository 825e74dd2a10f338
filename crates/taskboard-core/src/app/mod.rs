//! App - アプリケーション層
//!
//! ports と impls を組み合わせてボードを動かします。
//!
//! # 主要コンポーネント
//! - **selector**: 起動時に 1 度だけバックエンドを選ぶ
//! - **TaskBoard**: 状態の公開、CRUD、楽観的ステータス変更
//! - **seed**: 空のストアに例のタスクを入れる
//! - **BoardStats**: 列ごとの件数と時間の集計

pub mod board;
pub mod seed;
pub mod selector;
pub mod stats;

pub use self::board::{BoardState, MoveOutcome, Notice, STATUS_CHANGE_FAILED, TaskBoard};
pub use self::seed::{default_tasks, seed_if_empty};
pub use self::selector::{
    BackendKind, SelectedBackend, StorageEnvironment, bind_process_store, select_backend,
};
pub use self::stats::BoardStats;

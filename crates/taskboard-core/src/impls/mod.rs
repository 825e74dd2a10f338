//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **StructuredTaskStore**: redb による索引付き永続ストア（優先）
//! - **KeyValueTaskStore**: 1 つの JSON blob を丸ごと読み書きする fallback
//! - **MemoryTaskStore**: プロセス内だけの最終 fallback
//! - **FileKeyValue / MemoryKeyValue**: KeyValueSurface の実装

pub mod file_kv;
pub mod kv_store;
pub mod memory_kv;
pub mod memory_store;
pub mod structured_store;

use std::sync::Arc;

use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

// 主要な型を再エクスポート
pub use self::file_kv::FileKeyValue;
pub use self::kv_store::{KeyValueTaskStore, STORAGE_KEY};
pub use self::memory_kv::MemoryKeyValue;
pub use self::memory_store::MemoryTaskStore;
pub use self::structured_store::StructuredTaskStore;

/// バックエンドが共有する時計と ID 生成器
#[derive(Clone)]
pub struct StoreContext {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl StoreContext {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }
}

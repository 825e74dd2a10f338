//! Backend selector - 起動時に 1 度だけバックエンドを選ぶ
//!
//! # 優先順位
//! 1. 構造化ストア（redb ファイルを開けるか）
//! 2. key-value 面（番兵キーを書いて消せるか）
//! 3. メモリ（常に使える）
//!
//! 選択はここ 1 箇所だけで行い、呼び出し側は `Arc<dyn TaskStore>` だけを見ます。
//!
//! # プロセス共有
//! `bind_process_store` は最初の呼び出しで選んだバックエンドをプロセス終了まで保持します。
//! 再 probe も差し替えもしません。長く動くプロセスや複数ボードを扱う場合は
//! `select_backend` の結果を明示的に渡してください。

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::impls::{KeyValueTaskStore, MemoryTaskStore, StoreContext, StructuredTaskStore};
use crate::ports::{KeyValueSurface, TaskStore};

/// probe の入力: 実行環境に何があるか
#[derive(Clone, Default)]
pub struct StorageEnvironment {
    pub database_path: Option<PathBuf>,
    pub key_value: Option<Arc<dyn KeyValueSurface>>,
}

impl fmt::Debug for StorageEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEnvironment")
            .field("database_path", &self.database_path)
            .field("key_value", &self.key_value.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Structured,
    KeyValue,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Structured => "structured",
            BackendKind::KeyValue => "key-value",
            BackendKind::Memory => "memory",
        })
    }
}

/// 選ばれたバックエンド
#[derive(Clone)]
pub struct SelectedBackend {
    pub kind: BackendKind,
    pub store: Arc<dyn TaskStore>,
}

impl fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// 優先順位に従って probe し、最初に使えたバックエンドを返す
pub fn select_backend(env: &StorageEnvironment, ctx: StoreContext) -> SelectedBackend {
    if let Some(path) = &env.database_path {
        match StructuredTaskStore::open(path, ctx.clone()) {
            Ok(store) => {
                info!(backend = %BackendKind::Structured, path = %path.display(), "using structured store for tasks");
                return SelectedBackend {
                    kind: BackendKind::Structured,
                    store: Arc::new(store),
                };
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "structured store unavailable");
            }
        }
    }

    if let Some(surface) = &env.key_value {
        match surface.probe() {
            Ok(()) => {
                info!(backend = %BackendKind::KeyValue, "falling back to key-value storage for tasks");
                return SelectedBackend {
                    kind: BackendKind::KeyValue,
                    store: Arc::new(KeyValueTaskStore::with_context(Arc::clone(surface), ctx)),
                };
            }
            Err(e) => {
                warn!(error = %e, "key-value storage unavailable");
            }
        }
    }

    warn!(backend = %BackendKind::Memory, "no persistent storage available, using memory-only storage");
    SelectedBackend {
        kind: BackendKind::Memory,
        store: Arc::new(MemoryTaskStore::with_context(ctx)),
    }
}

static PROCESS_STORE: OnceLock<SelectedBackend> = OnceLock::new();

/// プロセス共有のバックエンド。最初の呼び出しの `env` だけが使われる。
pub fn bind_process_store(env: &StorageEnvironment) -> SelectedBackend {
    PROCESS_STORE
        .get_or_init(|| select_backend(env, StoreContext::default()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTaskPayload, TaskStatus};
    use crate::impls::MemoryKeyValue;

    #[test]
    fn prefers_structured_store() {
        let dir = tempfile::tempdir().unwrap();
        let env = StorageEnvironment {
            database_path: Some(dir.path().join("tasks.redb")),
            key_value: Some(Arc::new(MemoryKeyValue::new())),
        };

        assert_eq!(select_backend(&env, StoreContext::default()).kind, BackendKind::Structured);
    }

    #[test]
    fn unopenable_database_falls_back_to_key_value() {
        let dir = tempfile::tempdir().unwrap();
        let env = StorageEnvironment {
            database_path: Some(dir.path().join("missing").join("tasks.redb")),
            key_value: Some(Arc::new(MemoryKeyValue::new())),
        };

        assert_eq!(select_backend(&env, StoreContext::default()).kind, BackendKind::KeyValue);
    }

    #[test]
    fn disabled_key_value_falls_back_to_memory() {
        let env = StorageEnvironment {
            database_path: None,
            key_value: Some(Arc::new(MemoryKeyValue::disabled())),
        };

        assert_eq!(select_backend(&env, StoreContext::default()).kind, BackendKind::Memory);
    }

    #[test]
    fn empty_environment_uses_memory() {
        let selected = select_backend(&StorageEnvironment::default(), StoreContext::default());
        assert_eq!(selected.kind, BackendKind::Memory);
    }

    #[tokio::test]
    async fn process_store_binds_once() {
        let first = bind_process_store(&StorageEnvironment::default());
        first
            .store
            .create_task(CreateTaskPayload::new("shared", TaskStatus::Wait))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let second = bind_process_store(&StorageEnvironment {
            database_path: Some(dir.path().join("ignored.redb")),
            key_value: None,
        });

        assert_eq!(second.kind, BackendKind::Memory);
        assert!(Arc::ptr_eq(&first.store, &second.store));
        assert!(!dir.path().join("ignored.redb").exists());
    }
}

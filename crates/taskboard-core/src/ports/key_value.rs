//! KeyValueSurface port - 文字列 key-value ストレージ
//!
//! ブラウザの localStorage と同じ形の同期 API です。
//! 存在していても無効化されている（プライバシーモードなど）ことがあるため、
//! 利用可否は `probe` で書き込み→削除を試して確認します。

use thiserror::Error;

/// 利用可否の確認に使う番兵キー
pub const PROBE_KEY: &str = "__storage_test__";

#[derive(Debug, Error)]
pub enum KvError {
    #[error("quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("key-value storage is disabled")]
    Disabled,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// KeyValueSurface は文字列の key-value 面
pub trait KeyValueSurface: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, KvError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), KvError>;

    fn remove_item(&self, key: &str) -> Result<(), KvError>;

    /// 番兵を書いて消せるか確認する
    fn probe(&self) -> Result<(), KvError> {
        self.set_item(PROBE_KEY, PROBE_KEY)?;
        self.remove_item(PROBE_KEY)
    }
}

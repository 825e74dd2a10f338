//! Errors - ストア操作のエラー分類
//!
//! # 分類
//! - NotFound: 存在しない ID への update
//! - Storage: 永続化媒体が使えない、または容量超過
//! - InvalidFormat: import データやペイロードの形式不正

use thiserror::Error;

use super::TaskId;

/// StoreError は TaskStore の全バックエンドが返すエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl StoreError {
    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    pub fn invalid_format(message: impl std::fmt::Display) -> Self {
        Self::InvalidFormat(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("json: {err}"))
    }
}

//! taskboard-core
//!
//! Core building blocks for the task board.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskId, Task, payload, export snapshot, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, KeyValueSurface, Clock, IdGenerator）
//! - **impls**: 実装（構造化ストア、key-value ストア、メモリストア、key-value 面）
//! - **app**: バックエンド選択、ボードのコントローラ、初期データ、集計
//! - **query**: 絞り込みと並べ替え
//! - **config**: 設定の読み込み

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod query;

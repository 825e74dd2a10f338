//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部の仕組み（埋め込み DB、key-value 面、時計、乱数）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod key_value;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::key_value::{KeyValueSurface, KvError, PROBE_KEY};
pub use self::task_store::TaskStore;

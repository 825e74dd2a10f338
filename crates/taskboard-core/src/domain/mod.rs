//! Domain model (ids, task record, payloads, snapshot format, errors).

pub mod errors;
pub mod ids;
pub mod snapshot;
pub mod task;

pub use self::errors::StoreError;
pub use self::ids::TaskId;
pub use self::snapshot::{ExportSnapshot, SNAPSHOT_VERSION, parse_snapshot};
pub use self::task::{CreateTaskPayload, Priority, Task, TaskStatus, UpdateTaskPayload};

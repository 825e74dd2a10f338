//! FileKeyValue - ディレクトリを key-value 面として使う実装
//!
//! 1 キー = 1 ファイル。書き込みは一時ファイル経由で置き換えるので、
//! 途中で落ちても半端な値は残りません。

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::ports::{KeyValueSurface, KvError};

#[derive(Debug, Clone)]
pub struct FileKeyValue {
    dir: PathBuf,
}

impl FileKeyValue {
    /// ディレクトリがなければ作成する
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, KvError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened key-value directory");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// キーはファイル名に使えない文字を `_` に置き換える
    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueSurface for FileKeyValue {
    fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| KvError::Io(e.error))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), KvError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValue::open(dir.path().join("kv")).unwrap();

        assert_eq!(kv.get_item("tasks").unwrap(), None);
        kv.set_item("tasks", "[]").unwrap();
        assert_eq!(kv.get_item("tasks").unwrap().as_deref(), Some("[]"));

        kv.remove_item("tasks").unwrap();
        kv.remove_item("tasks").unwrap();
        assert_eq!(kv.get_item("tasks").unwrap(), None);
    }

    #[test]
    fn keys_are_sanitised_into_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValue::open(dir.path()).unwrap();

        kv.set_item("../escape", "x").unwrap();
        assert!(dir.path().join(".._escape.json").exists());
        assert_eq!(kv.get_item("../escape").unwrap().as_deref(), Some("x"));
    }
}

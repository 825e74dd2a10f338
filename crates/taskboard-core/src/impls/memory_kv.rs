//! MemoryKeyValue - プロセス内の KeyValueSurface
//!
//! 容量制限（quota）と無効化モードを持たせられるので、
//! localStorage の失敗パターン（容量超過・プライバシーモード）を再現できます。

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::{KeyValueSurface, KvError};

#[derive(Debug, Default)]
pub struct MemoryKeyValue {
    items: Mutex<HashMap<String, String>>,
    /// key + value の合計バイト数の上限
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// 面は存在するが、全操作が失敗する
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueSurface for MemoryKeyValue {
    fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
        if self.disabled {
            return Err(KvError::Disabled);
        }
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
        if self.disabled {
            return Err(KvError::Disabled);
        }
        let mut items = self.items();
        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(others);
            if needed > available {
                return Err(KvError::QuotaExceeded { needed, available });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), KvError> {
        if self.disabled {
            return Err(KvError::Disabled);
        }
        self.items().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_counts_replaced_value_once() {
        let kv = MemoryKeyValue::with_quota(10);
        kv.set_item("k", "123456789").unwrap();
        kv.set_item("k", "987654321").unwrap();

        let err = kv.set_item("k", "0123456789").unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { needed: 11, available: 10 }));
        assert_eq!(kv.get_item("k").unwrap().as_deref(), Some("987654321"));
    }

    #[test]
    fn disabled_surface_fails_probe() {
        assert!(MemoryKeyValue::disabled().probe().is_err());
        assert!(MemoryKeyValue::new().probe().is_ok());
    }

    #[test]
    fn probe_leaves_no_sentinel() {
        let kv = MemoryKeyValue::new();
        kv.probe().unwrap();
        assert_eq!(kv.get_item(crate::ports::PROBE_KEY).unwrap(), None);
    }
}

//! # 本地对象引用
//!
//! ## 设计思路
//!
//! 预览与结果都需要一个可引用的本地句柄（类似浏览器的 `blob:` URL）。
//! 句柄采用 RAII：创建即登记，`Drop` 即撤销，被新选择替换或会话销毁时自动释放，
//! 反复选择文件不会让登记表无限增长。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

const OBJECT_URL_PREFIX: &str = "blob:image-toolbox/";

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Bytes>>,
}

/// 对象引用登记表，可在多个会话间共享（`Clone` 共享同一份）。
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<RegistryInner>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一段字节并返回引用。
    pub fn create(&self, bytes: Bytes) -> ObjectUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        match self.inner.entries.lock() {
            Ok(mut entries) => {
                entries.insert(id, bytes);
            }
            Err(_) => log::warn!("⚠️ 对象引用登记表锁已中毒，引用 {} 将无法解析", id),
        }
        ObjectUrl {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// 按引用取回字节；已撤销的引用返回 `None`。
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        let id = url.strip_prefix(OBJECT_URL_PREFIX)?.parse::<u64>().ok()?;
        let entries = self.inner.entries.lock().ok()?;
        entries.get(&id).cloned()
    }

    /// 当前仍存活的引用数量。
    pub fn live_count(&self) -> usize {
        self.inner.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// 作用域内有效的对象引用，析构时自动撤销。
pub struct ObjectUrl {
    id: u64,
    registry: Arc<RegistryInner>,
}

impl ObjectUrl {
    pub fn as_string(&self) -> String {
        format!("{}{}", OBJECT_URL_PREFIX, self.id)
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.as_string()).finish()
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", OBJECT_URL_PREFIX, self.id)
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Ok(mut entries) = self.registry.entries.lock() {
            entries.remove(&self.id);
        }
    }
}

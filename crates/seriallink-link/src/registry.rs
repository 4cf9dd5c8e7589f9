use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::link::LinkShared;

/// Tracks the links that currently hold an open port.
///
/// A link registers itself when it connects and deregisters when it
/// disconnects or is dropped. Entries are weak, so the registry never keeps
/// a link alive. [`InterfaceRegistry::close_all`] is the shutdown hook: it
/// disconnects every link still registered.
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: Mutex<HashMap<String, Weak<LinkShared>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, port: &str, link: &Arc<LinkShared>) {
        let previous = self
            .lock()
            .insert(port.to_string(), Arc::downgrade(link));
        if previous.is_some_and(|prev| prev.strong_count() > 0 && prev.as_ptr() != Arc::as_ptr(link))
        {
            tracing::warn!(port, "port registered by a second link; replacing entry");
        }
    }

    /// Remove `port` if it is still registered to `link`.
    pub(crate) fn deregister(&self, port: &str, link: &LinkShared) {
        let mut entries = self.lock();
        let owned = entries
            .get(port)
            .is_some_and(|entry| std::ptr::eq(entry.as_ptr(), link));
        if owned {
            entries.remove(port);
        }
    }

    /// Disconnect every registered link. Returns how many were disconnected.
    ///
    /// Errors are logged and do not stop the remaining links from closing.
    pub fn close_all(&self) -> usize {
        let links: Vec<Arc<LinkShared>> = {
            let mut entries = self.lock();
            entries.retain(|_, entry| entry.strong_count() > 0);
            entries.values().filter_map(Weak::upgrade).collect()
        };

        let count = links.len();
        for link in links {
            link.disconnect();
        }
        if count > 0 {
            tracing::info!(count, "closed all registered links");
        }
        count
    }

    /// Number of live registered links.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, port: &str) -> bool {
        self.lock()
            .get(port)
            .is_some_and(|entry| entry.strong_count() > 0)
    }

    /// Registered port identifiers, sorted.
    pub fn ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.strong_count() > 0)
            .map(|(port, _)| port.clone())
            .collect();
        ports.sort();
        ports
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Weak<LinkShared>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceRegistry")
            .field("ports", &self.ports())
            .finish()
    }
}

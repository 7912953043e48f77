//! Per-filename advisory locks
//!
//! Every in-flight stream holds a `Lease` on its filename until the response
//! body is dropped. Delete refuses to unlink a leased file, and a file that is
//! being deleted cannot be leased.

use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::http::ResponseBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Reading(usize),
    Deleting,
}

/// Shared lock table keyed by stored filename
#[derive(Debug, Clone, Default)]
pub struct VideoLocks {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl VideoLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a read lease; `None` while the file is being deleted
    pub fn acquire(&self, name: &str) -> Option<Lease> {
        let mut table = self.table();
        match table.entry(name.to_string()).or_insert(Entry::Reading(0)) {
            Entry::Deleting => None,
            Entry::Reading(n) => {
                *n += 1;
                Some(Lease {
                    locks: self.clone(),
                    name: name.to_string(),
                })
            }
        }
    }

    /// Mark a file as being deleted; `None` while any stream holds it
    pub fn begin_delete(&self, name: &str) -> Option<DeleteGuard> {
        let mut table = self.table();
        match table.get(name) {
            Some(Entry::Reading(n)) if *n > 0 => None,
            Some(Entry::Deleting) => None,
            _ => {
                table.insert(name.to_string(), Entry::Deleting);
                Some(DeleteGuard {
                    locks: self.clone(),
                    name: name.to_string(),
                })
            }
        }
    }

    /// Number of live leases on `name`
    #[cfg(test)]
    fn readers(&self, name: &str) -> usize {
        match self.table().get(name) {
            Some(Entry::Reading(n)) => *n,
            _ => 0,
        }
    }

    fn release(&self, name: &str) {
        let mut table = self.table();
        if let Some(Entry::Reading(n)) = table.get_mut(name) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                table.remove(name);
            }
        }
    }
}

/// Read lease, released on drop
#[derive(Debug)]
pub struct Lease {
    locks: VideoLocks,
    name: String,
}

impl Lease {
    /// Keep this lease alive for as long as `body` is
    pub fn attach(self, body: ResponseBody) -> ResponseBody {
        body.map_frame(move |frame| {
            let _held = &self;
            frame
        })
        .boxed_unsync()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.locks.release(&self.name);
    }
}

/// Exclusive delete marker, cleared on drop
#[derive(Debug)]
pub struct DeleteGuard {
    locks: VideoLocks,
    name: String,
}

impl Drop for DeleteGuard {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        if table.get(&self.name) == Some(&Entry::Deleting) {
            table.remove(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::full;

    #[test]
    fn test_leases_are_counted() {
        let locks = VideoLocks::default();
        let a = locks.acquire("x.mp4").unwrap();
        let b = locks.acquire("x.mp4").unwrap();
        assert_eq!(locks.readers("x.mp4"), 2);
        drop(a);
        assert_eq!(locks.readers("x.mp4"), 1);
        drop(b);
        assert_eq!(locks.readers("x.mp4"), 0);
    }

    #[test]
    fn test_delete_blocked_by_reader() {
        let locks = VideoLocks::default();
        let lease = locks.acquire("x.mp4").unwrap();
        assert!(locks.begin_delete("x.mp4").is_none());
        drop(lease);
        assert!(locks.begin_delete("x.mp4").is_some());
    }

    #[test]
    fn test_no_lease_while_deleting() {
        let locks = VideoLocks::default();
        let guard = locks.begin_delete("x.mp4").unwrap();
        assert!(locks.acquire("x.mp4").is_none());
        assert!(locks.acquire("other.mp4").is_some());
        drop(guard);
        assert!(locks.acquire("x.mp4").is_some());
    }

    #[test]
    fn test_lease_follows_body() {
        let locks = VideoLocks::default();
        let body = locks.acquire("x.mp4").unwrap().attach(full("data"));
        assert_eq!(locks.readers("x.mp4"), 1);
        drop(body);
        assert_eq!(locks.readers("x.mp4"), 0);
    }
}

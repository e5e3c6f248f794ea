//! Per-package-name mutual exclusion
//!
//! Version assignment reads the latest version and writes the next one, so
//! two registrations for the same package name must not interleave.
//! Registrations for different package names never wait on each other.
//! An entry lives in the table only while some caller holds or awaits it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{RegistryError, Result};

#[derive(Debug, Default)]
pub struct PackageLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PackageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `package`
    pub fn with_lock<T>(&self, package: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.table()?;
            Arc::clone(locks.entry(package.to_string()).or_default())
        };

        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(RegistryError::Storage(format!(
                "Failed to acquire lock for package [{}]",
                package
            ))),
        };
        self.release(package, &lock);
        result
    }

    /// Number of package names currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>>> {
        self.locks
            .lock()
            .map_err(|_| RegistryError::Storage("Failed to acquire package lock table".to_string()))
    }

    /// Drop the table entry once only the table and `lock` still point at it.
    /// New holders clone under the table lock, so the count cannot grow here.
    fn release(&self, package: &str, lock: &Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            if Arc::strong_count(lock) == 2 {
                locks.remove(package);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_package_is_serialized() {
        let locks = Arc::new(PackageLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, max_inside) = (locks.clone(), inside.clone(), max_inside.clone());
                thread::spawn(move || {
                    locks
                        .with_lock("wecmdb", || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(5));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_entries_are_pruned_after_release() {
        let locks = PackageLocks::new();
        locks.with_lock("wecmdb", || Ok(())).unwrap();
        let err = locks
            .with_lock("monitor", || -> Result<()> {
                Err(RegistryError::PackageNotFound { package: "monitor".into() })
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PackageNotFound);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_different_packages_do_not_block() {
        let locks = Arc::new(PackageLocks::new());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let locks = locks.clone();
            thread::spawn(move || {
                locks
                    .with_lock("pkgA", || {
                        entered_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            })
        };

        entered_rx.recv().unwrap();
        // pkgA is held; pkgB must still be available
        let value = locks.with_lock("pkgB", || Ok(42)).unwrap();
        assert_eq!(value, 42);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
    }
}

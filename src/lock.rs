use std::fs::OpenOptions;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// How long to wait for a contended storage lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const LOCK_FILE: &str = "store.lock";

/// Acquire an advisory file lock on the storage directory, execute `f`, then
/// release.
///
/// Creates `<dir>/store.lock` and takes an exclusive `fs2` lock on it,
/// retrying with backoff until `timeout` elapses. Serializes read-modify-write
/// cycles across threads and processes sharing the same storage root.
///
/// # Arguments
/// * `dir` - The storage directory (created if missing).
/// * `timeout` - Maximum time to wait for a contended lock.
/// * `f` - Closure to execute while the lock is held.
///
/// # Errors
/// Returns [`Error::StorageLocked`] if the lock cannot be acquired in time.
pub fn with_store_lock<F, T>(dir: &Path, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let lock_path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let deadline = Instant::now() + timeout;
    let mut backoff = Duration::from_millis(10);
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => break,
            Err(e) if is_contended(&e) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::storage_locked(format!(
                        "{} is held by another process",
                        lock_path.display()
                    )));
                }
                std::thread::sleep(backoff.min(deadline - now));
                backoff = (backoff * 2).min(Duration::from_millis(200));
            }
            Err(e) => {
                return Err(Error::storage_locked(format!(
                    "{}: {}",
                    lock_path.display(),
                    e
                )));
            }
        }
    }

    log::debug!("acquired {}", lock_path.display());
    let result = f();
    let _ = FileExt::unlock(&file);
    result
    // file drops here, releasing any lock the unlock above missed
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

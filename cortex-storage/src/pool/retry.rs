//! Exponential backoff retry for transient SQLITE_BUSY/SQLITE_LOCKED errors.

use std::thread::sleep;
use std::time::Duration;

use cortex_core::errors::{is_busy_or_locked, CortexError, CortexResult};

/// Run `f`, retrying on busy/locked errors with exponential backoff starting
/// at `initial_backoff_ms` and doubling up to `max_backoff_ms`, for at most
/// `max_attempts` total tries. Any other error, or exhaustion of attempts,
/// is returned to the caller.
pub fn with_retry<F, T>(
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    max_attempts: u32,
    mut f: F,
) -> CortexResult<T>
where
    F: FnMut() -> Result<T, rusqlite::Error>,
{
    let mut backoff = initial_backoff_ms;
    for attempt in 1..=max_attempts {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_busy_or_locked(&e) && attempt < max_attempts => {
                sleep(Duration::from_millis(backoff));
                backoff = (backoff * 2).min(max_backoff_ms);
            }
            Err(e) if is_busy_or_locked(&e) => {
                return Err(CortexError::RetryExhausted { attempts: max_attempts });
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("max_attempts must be >= 1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn succeeds_without_retry_on_ok() {
        let result = with_retry(1, 2, 3, || Ok::<_, rusqlite::Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn gives_up_after_max_attempts_on_persistent_busy() {
        let calls = Cell::new(0);
        let result: CortexResult<()> = with_retry(1, 2, 3, || {
            calls.set(calls.get() + 1);
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                None,
            ))
        });
        assert!(matches!(result, Err(CortexError::RetryExhausted { attempts: 3 })));
        assert_eq!(calls.get(), 3);
    }
}

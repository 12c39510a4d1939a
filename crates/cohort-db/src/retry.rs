//! Lock contention classification and the allocator's retry budget.
//!
//! `SQLite` waits up to `busy_timeout` for the write lock, then fails the
//! statement with a busy/locked error. The allocator retries such a failure
//! once; every other error propagates immediately.

use crate::error::DatabaseError;

/// Attempts the allocator makes before giving up: the first try plus one retry.
pub const ALLOCATION_ATTEMPTS: u32 = 2;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Detect a lock-wait timeout or lock conflict.
///
/// The predicate is intentionally narrow to avoid retrying genuine SQL or
/// constraint errors.
pub fn is_lock_contention(e: &libsql::Error) -> bool {
    if let libsql::Error::SqliteFailure(code, _) = e {
        if matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED) {
            return true;
        }
    }
    let msg = e.to_string().to_ascii_lowercase();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("sqlite_busy")
        || msg.contains("database is busy")
}

/// [`is_lock_contention`] lifted to store errors.
#[must_use]
pub fn is_transient(e: &DatabaseError) -> bool {
    matches!(e, DatabaseError::LibSql(inner) if is_lock_contention(inner))
}

/// Run `op` until it succeeds, fails with a non-transient error, or has been
/// tried `attempts` times. Each call of `op` must open its own transaction.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn retry_on_contention<T, F, Fut>(
    attempts: u32,
    scope: &str,
    mut op: F,
) -> Result<T, DatabaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if attempt < attempts && is_transient(&e) => {
                tracing::warn!(scope, attempt, error = %e, "lock contention, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::errors::CoreError;

    #[test]
    fn sql_errors_are_not_transient() {
        let err = libsql::Error::Misuse("no such table: group_results".into());
        assert!(!is_lock_contention(&err));
    }

    #[test]
    fn busy_errors_are_transient() {
        let err = libsql::Error::SqliteFailure(5, "database is locked".into());
        assert!(is_lock_contention(&err));
        assert!(is_transient(&DatabaseError::LibSql(err)));
    }

    #[tokio::test]
    async fn retries_contention_once() {
        let mut calls = 0;
        let result: Result<u32, DatabaseError> = retry_on_contention(ALLOCATION_ATTEMPTS, "test", || {
            calls += 1;
            let call = calls;
            async move {
                if call == 1 {
                    Err(DatabaseError::LibSql(libsql::Error::SqliteFailure(
                        5,
                        "database is locked".into(),
                    )))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_the_budget() {
        let mut calls = 0;
        let result: Result<(), DatabaseError> = retry_on_contention(ALLOCATION_ATTEMPTS, "test", || {
            calls += 1;
            async {
                Err(DatabaseError::LibSql(libsql::Error::SqliteFailure(
                    5,
                    "database is locked".into(),
                )))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn domain_errors_fail_immediately() {
        let mut calls = 0;
        let result: Result<(), DatabaseError> = retry_on_contention(ALLOCATION_ATTEMPTS, "test", || {
            calls += 1;
            async { Err(DatabaseError::NoResult) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn domain_errors_are_not_transient() {
        let err = DatabaseError::Core(CoreError::Forbidden("inactive batch".into()));
        assert!(!is_transient(&err));
    }
}

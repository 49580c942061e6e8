//! Transaction helper for multi-table writes

use tracing::{debug, warn};

use crate::backends::Connection;
use crate::error::OrmResult;

/// Run `f` inside a transaction on `conn`
///
/// Commits when `f` returns `Ok`, rolls back and returns the original error
/// otherwise. When a transaction is already open the closure joins it and
/// the outermost caller decides the outcome.
pub fn transaction<C, F, R>(conn: &mut C, f: F) -> OrmResult<R>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut C) -> OrmResult<R>,
{
    if conn.in_transaction() {
        debug!("Joining active transaction");
        return f(conn);
    }

    debug!("Beginning transaction");
    conn.begin()?;

    match f(conn) {
        Ok(value) => {
            conn.commit()?;
            debug!("Transaction committed successfully");
            Ok(value)
        }
        Err(err) => {
            debug!("Rolling back transaction: {}", err);
            if let Err(rollback_err) = conn.rollback() {
                warn!("Rollback failed after error '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

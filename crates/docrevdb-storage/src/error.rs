use docrevdb_core::DocError;
use rusqlite::ErrorCode;

/// Maps a `rusqlite::Error` onto the core error taxonomy (spec §7): SQLite's
/// busy/locked codes become `Busy` (caller retries or the enclosing
/// transaction rolls back), everything else is `Internal`.
pub(crate) fn map_sqlite_err(err: rusqlite::Error) -> DocError {
    if let rusqlite::Error::SqliteFailure(sqlite_err, _) = &err
        && matches!(sqlite_err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    {
        return DocError::Busy;
    }
    DocError::Internal(err.to_string())
}

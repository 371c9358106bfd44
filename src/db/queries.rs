use rusqlite::{params, Connection, OptionalExtension};

// ── Session entries ──

pub fn get_entry(conn: &Connection, scope: &str, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM session_entries WHERE scope = ?1 AND key = ?2",
        params![scope, key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_entry(conn: &Connection, scope: &str, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO session_entries (scope, key, value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![scope, key, value],
    )?;
    Ok(())
}

/// Returns whether an entry was removed.
pub fn clear_entry(conn: &Connection, scope: &str, key: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM session_entries WHERE scope = ?1 AND key = ?2",
        params![scope, key],
    )?;
    Ok(removed > 0)
}

pub fn clear_scope(conn: &Connection, scope: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM session_entries WHERE scope = ?1", params![scope])
}

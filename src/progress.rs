use crate::puzzle::Difficulty;
use crate::session::SessionSummary;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::collections::HashSet;
use std::path::Path;

/// One finished session, as stored in the history table.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub finished_at: DateTime<Local>,
    pub difficulty: String,
    pub elapsed_secs: f64,
    pub accuracy: f64,
    pub avg_secs_per_puzzle: f64,
    pub puzzles_attempted: u32,
    pub puzzles_solved: u32,
    pub moves_found: u32,
    pub moves_available: u32,
    pub total_clicks: u32,
    pub total_errors: u32,
}

/// Persistent progress store: which puzzles have ever been solved, plus a
/// history of finished sessions.
#[derive(Debug)]
pub struct ProgressDb {
    conn: Connection,
}

impl ProgressDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS solved_puzzles (
                puzzle_id INTEGER PRIMARY KEY,
                first_solved_at TEXT NOT NULL,
                times_solved INTEGER NOT NULL DEFAULT 1
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                elapsed_secs REAL NOT NULL,
                accuracy REAL NOT NULL,
                avg_secs_per_puzzle REAL NOT NULL,
                puzzles_attempted INTEGER NOT NULL,
                puzzles_solved INTEGER NOT NULL,
                moves_found INTEGER NOT NULL,
                moves_available INTEGER NOT NULL,
                total_clicks INTEGER NOT NULL,
                total_errors INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_results_finished_at ON session_results(finished_at)",
            [],
        )?;

        Ok(ProgressDb { conn })
    }

    /// Record a solve. Repeat solves bump the counter, not the first-solved
    /// timestamp.
    pub fn record_puzzle_solved(&self, puzzle_id: u32) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO solved_puzzles (puzzle_id, first_solved_at, times_solved)
            VALUES (?1, ?2, 1)
            ON CONFLICT(puzzle_id) DO UPDATE SET times_solved = times_solved + 1
            "#,
            params![puzzle_id, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn solved_ids(&self) -> Result<HashSet<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT puzzle_id FROM solved_puzzles")?;
        let ids = stmt.query_map([], |row| row.get::<_, u32>(0))?;
        ids.collect()
    }

    pub fn record_session_result(&self, summary: &SessionSummary) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO session_results
            (finished_at, difficulty, elapsed_secs, accuracy, avg_secs_per_puzzle,
             puzzles_attempted, puzzles_solved, moves_found, moves_available,
             total_clicks, total_errors)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                Local::now().to_rfc3339(),
                summary.difficulty.to_string(),
                summary.elapsed_secs,
                summary.accuracy,
                summary.avg_secs_per_puzzle,
                summary.stats.puzzles_attempted,
                summary.stats.puzzles_solved,
                summary.stats.moves_found,
                summary.stats.moves_available,
                summary.stats.total_clicks,
                summary.stats.total_errors,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT finished_at, difficulty, elapsed_secs, accuracy, avg_secs_per_puzzle,
                   puzzles_attempted, puzzles_solved, moves_found, moves_available,
                   total_clicks, total_errors
            FROM session_results
            ORDER BY finished_at DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map([limit], read_record)?;
        rows.collect()
    }

    /// The whole history, most recent first. No row cap, so the CSV export
    /// never silently truncates.
    pub fn all_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT finished_at, difficulty, elapsed_secs, accuracy, avg_secs_per_puzzle,
                   puzzles_attempted, puzzles_solved, moves_found, moves_available,
                   total_clicks, total_errors
            FROM session_results
            ORDER BY finished_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], read_record)?;
        rows.collect()
    }

    /// Write the whole session history as CSV.
    pub fn export_history_csv<W: std::io::Write>(
        &self,
        writer: W,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let sessions = self.all_sessions()?;
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "finished_at",
            "difficulty",
            "elapsed_secs",
            "accuracy",
            "avg_secs_per_puzzle",
            "puzzles_attempted",
            "puzzles_solved",
            "moves_found",
            "moves_available",
            "total_clicks",
            "total_errors",
        ])?;
        for s in sessions {
            wtr.write_record([
                s.finished_at.to_rfc3339(),
                s.difficulty,
                s.elapsed_secs.to_string(),
                s.accuracy.to_string(),
                s.avg_secs_per_puzzle.to_string(),
                s.puzzles_attempted.to_string(),
                s.puzzles_solved.to_string(),
                s.moves_found.to_string(),
                s.moves_available.to_string(),
                s.total_clicks.to_string(),
                s.total_errors.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let finished_at_str: String = row.get(0)?;
    let finished_at = DateTime::parse_from_rfc3339(&finished_at_str)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                0,
                "finished_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })?
        .with_timezone(&Local);
    Ok(SessionRecord {
        finished_at,
        difficulty: row.get(1)?,
        elapsed_secs: row.get(2)?,
        accuracy: row.get(3)?,
        avg_secs_per_puzzle: row.get(4)?,
        puzzles_attempted: row.get(5)?,
        puzzles_solved: row.get(6)?,
        moves_found: row.get(7)?,
        moves_available: row.get(8)?,
        total_clicks: row.get(9)?,
        total_errors: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStats;

    fn summary(solved: u32) -> SessionSummary {
        SessionSummary {
            difficulty: Difficulty::Easy,
            elapsed_secs: 120.0,
            accuracy: 75.0,
            avg_secs_per_puzzle: 24.0,
            stats: SessionStats {
                total_clicks: 20,
                total_errors: 2,
                moves_found: 9,
                moves_available: 12,
                category_found: [3, 3, 2, 1],
                category_total: [4, 4, 2, 2],
                puzzles_attempted: 5,
                puzzles_solved: solved,
                newly_solved: solved,
                previously_solved: 0,
            },
        }
    }

    #[test]
    fn record_and_list_solved_puzzles() {
        let db = ProgressDb::open_in_memory().unwrap();
        db.record_puzzle_solved(7).unwrap();
        db.record_puzzle_solved(11).unwrap();
        let ids = db.solved_ids().unwrap();
        assert_eq!(ids, [7, 11].into_iter().collect());
    }

    #[test]
    fn repeat_solves_do_not_duplicate() {
        let db = ProgressDb::open_in_memory().unwrap();
        db.record_puzzle_solved(3).unwrap();
        db.record_puzzle_solved(3).unwrap();
        assert_eq!(db.solved_ids().unwrap().len(), 1);

        let times: u32 = db
            .conn
            .query_row(
                "SELECT times_solved FROM solved_puzzles WHERE puzzle_id = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(times, 2);
    }

    #[test]
    fn session_results_round_trip() {
        let db = ProgressDb::open_in_memory().unwrap();
        db.record_session_result(&summary(4)).unwrap();
        db.record_session_result(&summary(5)).unwrap();

        let sessions = db.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].difficulty, "easy");
        assert_eq!(sessions[0].puzzles_attempted, 5);
        assert_eq!(sessions[0].moves_found, 9);
        assert_eq!(sessions[0].accuracy, 75.0);
    }

    #[test]
    fn recent_sessions_respects_limit() {
        let db = ProgressDb::open_in_memory().unwrap();
        for i in 0..5 {
            db.record_session_result(&summary(i)).unwrap();
        }
        assert_eq!(db.recent_sessions(3).unwrap().len(), 3);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        let db = ProgressDb::open(&path).unwrap();
        db.record_puzzle_solved(1).unwrap();
        assert!(path.exists());

        // Reopen and read back.
        drop(db);
        let db = ProgressDb::open(&path).unwrap();
        assert!(db.solved_ids().unwrap().contains(&1));
    }

    #[test]
    fn csv_export_covers_the_whole_history() {
        let db = ProgressDb::open_in_memory().unwrap();
        for i in 0..25 {
            db.record_session_result(&summary(i)).unwrap();
        }
        let mut out = Vec::new();
        db.export_history_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        // Header plus one row per recorded session.
        assert_eq!(text.lines().count(), 26);
    }

    #[test]
    fn csv_export_includes_header_and_rows() {
        let db = ProgressDb::open_in_memory().unwrap();
        db.record_session_result(&summary(2)).unwrap();

        let mut out = Vec::new();
        db.export_history_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("finished_at,difficulty"));
        assert_eq!(lines.count(), 1);
    }
}

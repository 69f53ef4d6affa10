//! Row-level access to the `bulk_jobs` and `bulk_job_results` tables.
//!
//! Functions take a `&Connection` so the store can compose them inside one
//! transaction via [`Database::with_tx`](super::Database::with_tx).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job row.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub file_name: String,
    pub status: String,
    pub total_articles: i64,
    pub completed_articles: i64,
    pub failed_articles: i64,
    /// JSON-encoded job settings.
    pub settings: String,
    pub fault: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            status: row.get("status")?,
            total_articles: row.get("total_articles")?,
            completed_articles: row.get("completed_articles")?,
            failed_articles: row.get("failed_articles")?,
            settings: row.get("settings")?,
            fault: row.get("fault")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

/// A raw per-row result.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub job_id: String,
    pub row_index: i64,
    /// `success` or `failure`.
    pub outcome: String,
    /// JSON-encoded article, set for successes.
    pub article: Option<String>,
    pub reason: Option<String>,
    pub recorded_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            row_index: row.get("row_index")?,
            outcome: row.get("outcome")?,
            article: row.get("article")?,
            reason: row.get("reason")?,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

pub fn insert_job(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bulk_jobs (id, file_name, status, total_articles, completed_articles,
         failed_articles, settings, fault, created_at, updated_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            job.id,
            job.file_name,
            job.status,
            job.total_articles,
            job.completed_articles,
            job.failed_articles,
            job.settings,
            job.fault,
            job.created_at,
            job.updated_at,
            job.finished_at,
        ],
    )?;
    Ok(())
}

/// Overwrites the mutable columns: status, counters, fault and timestamps.
pub fn update_progress(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE bulk_jobs SET status=?2, completed_articles=?3, failed_articles=?4,
         fault=?5, updated_at=?6, finished_at=?7
         WHERE id=?1",
        params![
            job.id,
            job.status,
            job.completed_articles,
            job.failed_articles,
            job.fault,
            job.updated_at,
            job.finished_at,
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM bulk_jobs WHERE id = ?1",
            params![id],
            JobRow::from_row,
        )
        .optional()?)
}

/// All jobs, newest first.
pub fn list_jobs(conn: &Connection) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM bulk_jobs ORDER BY created_at DESC, id ASC")?;
    let rows = stmt
        .query_map([], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Inserts a row result. Fails if one is already stored for the index.
pub fn insert_result(conn: &Connection, result: &ResultRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bulk_job_results (job_id, row_index, outcome, article, reason, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            result.job_id,
            result.row_index,
            result.outcome,
            result.article,
            result.reason,
            result.recorded_at,
        ],
    )?;
    Ok(())
}

/// Results for one job, ordered by row index.
pub fn results_for(conn: &Connection, job_id: &str) -> Result<Vec<ResultRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM bulk_job_results WHERE job_id = ?1 ORDER BY row_index")?;
    let rows = stmt
        .query_map(params![job_id], ResultRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes a job and, by cascade, its results. Returns whether it existed.
pub fn delete_job(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM bulk_jobs WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_job(id: &str, created_at: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            file_name: "articles.csv".to_string(),
            status: "pending".to_string(),
            total_articles: 3,
            completed_articles: 0,
            failed_articles: 0,
            settings: r#"{"tone":"casual"}"#.to_string(),
            fault: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            finished_at: None,
        }
    }

    fn failure(job_id: &str, index: i64) -> ResultRow {
        ResultRow {
            job_id: job_id.to_string(),
            row_index: index,
            outcome: "failure".to_string(),
            article: None,
            reason: Some("cancelled".to_string()),
            recorded_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        db.with_conn(|conn| {
            insert_job(conn, &sample_job("j1", "2026-01-01T00:00:00Z"))?;
            let found = find_by_id(conn, "j1")?.unwrap();
            assert_eq!(found.file_name, "articles.csv");
            assert_eq!(found.total_articles, 3);
            assert!(find_by_id(conn, "missing")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_progress() {
        let db = test_db();
        db.with_conn(|conn| {
            let mut job = sample_job("j1", "2026-01-01T00:00:00Z");
            insert_job(conn, &job)?;

            job.status = "completed".to_string();
            job.completed_articles = 2;
            job.failed_articles = 1;
            job.finished_at = Some("2026-01-01T00:05:00Z".to_string());
            update_progress(conn, &job)?;

            let found = find_by_id(conn, "j1")?.unwrap();
            assert_eq!(found.status, "completed");
            assert_eq!(found.completed_articles, 2);
            assert_eq!(found.failed_articles, 1);
            assert!(found.finished_at.is_some());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_jobs_newest_first() {
        let db = test_db();
        db.with_conn(|conn| {
            insert_job(conn, &sample_job("old", "2026-01-01T00:00:00Z"))?;
            insert_job(conn, &sample_job("new", "2026-02-01T00:00:00Z"))?;
            let ids: Vec<String> = list_jobs(conn)?.into_iter().map(|j| j.id).collect();
            assert_eq!(ids, vec!["new", "old"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_results_ordered_and_write_once() {
        let db = test_db();
        db.with_conn(|conn| {
            insert_job(conn, &sample_job("j1", "2026-01-01T00:00:00Z"))?;
            insert_result(conn, &failure("j1", 2))?;
            insert_result(conn, &failure("j1", 0))?;
            assert!(insert_result(conn, &failure("j1", 0)).is_err());

            let indices: Vec<i64> = results_for(conn, "j1")?.iter().map(|r| r.row_index).collect();
            assert_eq!(indices, vec![0, 2]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_cascades_to_results() {
        let db = test_db();
        db.with_conn(|conn| {
            insert_job(conn, &sample_job("j1", "2026-01-01T00:00:00Z"))?;
            insert_result(conn, &failure("j1", 0))?;
            assert!(delete_job(conn, "j1")?);
            assert!(!delete_job(conn, "j1")?);
            assert!(results_for(conn, "j1")?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}

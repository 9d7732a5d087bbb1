//! Things 3 database reader
//!
//! Opens `main.sqlite` read-only and yields flat records for the assembler.
//! Things stores areas in `TMArea` and everything else in `TMTask`, told
//! apart by `type` (0 task, 1 project, 2 heading).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use things2gtasks_core::assemble::assemble;
use things2gtasks_core::error::SourceUnavailable;
use things2gtasks_core::model::{Area, Forest, Heading, Project, Task, TaskParent};

const TYPE_TASK: i64 = 0;
const TYPE_PROJECT: i64 = 1;
const TYPE_HEADING: i64 = 2;

const STATUS_CANCELED: i64 = 2;
const STATUS_COMPLETED: i64 = 3;

/// How long to wait on a database Things is currently writing to.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ThingsReader {
    conn: Connection,
    /// Older databases have no `TMArea.trashed` column.
    area_trash: bool,
    due_column: &'static str,
}

impl ThingsReader {
    pub fn open(path: &Path) -> Result<Self, SourceUnavailable> {
        if !path.exists() {
            return Err(SourceUnavailable::new(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(path, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| unavailable(path, e))?;

        // Opening is lazy; a locked or foreign file only shows up on first read.
        conn.query_row("SELECT COUNT(*) FROM TMTask", [], |row| row.get::<_, i64>(0))
            .map_err(|e| unavailable(path, e))?;

        let area_trash = has_column(&conn, "TMArea", "trashed").map_err(|e| unavailable(path, e))?;
        let due_column = if has_column(&conn, "TMTask", "dueDate").map_err(|e| unavailable(path, e))? {
            "dueDate"
        } else {
            "deadline"
        };

        log::debug!(
            "Opened Things database {} (area trash flag: {}, due column: {})",
            path.display(),
            area_trash,
            due_column
        );

        Ok(Self {
            conn,
            area_trash,
            due_column,
        })
    }

    /// Join condition keeping only live areas.
    fn live_area(&self, alias: &str) -> String {
        if self.area_trash {
            format!("AND {alias}.trashed = 0")
        } else {
            String::new()
        }
    }

    pub fn list_areas(&self) -> Result<Vec<Area>, SourceUnavailable> {
        let filter = if self.area_trash { "WHERE trashed = 0" } else { "" };
        let sql = format!(r#"SELECT uuid, title, "index" FROM TMArea {filter}"#);

        let mut stmt = self.conn.prepare(&sql).map_err(query_failed)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Area {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    index: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                })
            })
            .map_err(query_failed)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_failed)
    }

    /// Live projects. A project whose area is trashed or missing is read as
    /// area-less.
    pub fn list_projects(&self) -> Result<Vec<Project>, SourceUnavailable> {
        let sql = format!(
            r#"
            SELECT p.uuid, p.title, a.uuid, p."index", p.notes
            FROM TMTask p
            LEFT JOIN TMArea a ON a.uuid = p.area {live_area}
            WHERE p.type = {TYPE_PROJECT} AND p.trashed = 0
            "#,
            live_area = self.live_area("a"),
        );

        let mut stmt = self.conn.prepare(&sql).map_err(query_failed)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    area_id: row.get(2)?,
                    index: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                    notes: non_empty(row.get(4)?),
                })
            })
            .map_err(query_failed)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_failed)
    }

    /// Live headings of live projects.
    pub fn list_headings(&self) -> Result<Vec<Heading>, SourceUnavailable> {
        let sql = format!(
            r#"
            SELECT h.uuid, h.title, h.project, h."index"
            FROM TMTask h
            LEFT JOIN TMTask p ON p.uuid = h.project
            WHERE h.type = {TYPE_HEADING} AND h.trashed = 0
              AND h.project IS NOT NULL
              AND COALESCE(p.trashed, 0) = 0
            "#
        );

        let mut stmt = self.conn.prepare(&sql).map_err(query_failed)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Heading {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    project_id: row.get(2)?,
                    index: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                })
            })
            .map_err(query_failed)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_failed)
    }

    /// Live tasks whose project and heading are live too.
    ///
    /// References to rows that do not exist at all are kept so the assembler
    /// can report them.
    pub fn list_tasks(&self) -> Result<Vec<Task>, SourceUnavailable> {
        let sql = format!(
            r#"
            SELECT t.uuid, t.title, t.heading, t.project, a.uuid,
                   t.status, t."index", t.notes, t.{due}
            FROM TMTask t
            LEFT JOIN TMTask h ON h.uuid = t.heading
            LEFT JOIN TMTask hp ON hp.uuid = h.project
            LEFT JOIN TMTask p ON p.uuid = t.project
            LEFT JOIN TMArea a ON a.uuid = t.area {live_area}
            WHERE t.type = {TYPE_TASK} AND t.trashed = 0
              AND COALESCE(h.trashed, 0) = 0
              AND COALESCE(hp.trashed, 0) = 0
              AND COALESCE(p.trashed, 0) = 0
            "#,
            due = self.due_column,
            live_area = self.live_area("a"),
        );

        let mut stmt = self.conn.prepare(&sql).map_err(query_failed)?;
        let rows = stmt
            .query_map([], |row| {
                let status: Value = row.get(5)?;
                let due: Value = row.get(8)?;
                Ok(Task {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    parent: task_parent(row.get(2)?, row.get(3)?, row.get(4)?),
                    completed: is_completed(&status),
                    index: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
                    notes: non_empty(row.get(7)?),
                    due: parse_due(&due),
                })
            })
            .map_err(query_failed)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_failed)
    }
}

/// Read the whole database and assemble it. Nothing is written anywhere if
/// this fails.
pub fn load_forest(path: &Path) -> color_eyre::Result<Forest> {
    let reader = ThingsReader::open(path)?;

    let areas = reader.list_areas()?;
    let projects = reader.list_projects()?;
    let headings = reader.list_headings()?;
    let tasks = reader.list_tasks()?;
    log::info!(
        "Read {} area(s), {} project(s), {} heading(s), {} task(s) from {}",
        areas.len(),
        projects.len(),
        headings.len(),
        tasks.len(),
        path.display()
    );

    Ok(assemble(areas, projects, headings, tasks)?)
}

fn unavailable(path: &Path, err: rusqlite::Error) -> SourceUnavailable {
    SourceUnavailable::new(format!("cannot read {}: {}", path.display(), err))
}

fn query_failed(err: rusqlite::Error) -> SourceUnavailable {
    SourceUnavailable::new(format!("query failed: {err}"))
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Most specific parent wins: heading, then project, then area.
pub fn task_parent(
    heading: Option<String>,
    project: Option<String>,
    area: Option<String>,
) -> TaskParent {
    match (heading, project, area) {
        (Some(h), _, _) => TaskParent::Heading(h),
        (None, Some(p), _) => TaskParent::Project(p),
        (None, None, Some(a)) => TaskParent::Area(a),
        (None, None, None) => TaskParent::None,
    }
}

/// Completed and canceled both count as done.
pub fn is_completed(status: &Value) -> bool {
    match status {
        Value::Integer(n) => *n == STATUS_COMPLETED || *n == STATUS_CANCELED,
        Value::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "completed" | "canceled" | "cancelled" | "2" | "3"
        ),
        _ => false,
    }
}

/// Read a due date stored as text, a unix timestamp, or Things' packed
/// `year << 16 | month << 12 | day << 7` integer.
pub fn parse_due(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Integer(n) => parse_packed(*n).or_else(|| from_timestamp(*n)),
        Value::Real(f) => from_timestamp(f.trunc() as i64),
        Value::Text(s) => parse_due_text(s.trim()),
        _ => None,
    }
}

fn parse_packed(n: i64) -> Option<NaiveDate> {
    let year = n >> 16;
    if !(1900..3000).contains(&year) {
        return None;
    }
    let month = (n >> 12) & 0xF;
    let day = (n >> 7) & 0x1F;
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
}

fn from_timestamp(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

fn parse_due_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return parse_packed(n).or_else(|| from_timestamp(n));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.date());
    }
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

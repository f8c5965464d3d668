//! Read access to ROS 2 `.db3` bags.
//!
//! A [`BagReader`] owns one read-only SQLite connection and a private
//! current-thread runtime to drive it. Calls block the calling thread, so a
//! reader belongs to exactly one worker.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: i64,
    pub name: String,
}

/// Message row without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct TopicStat {
    pub name: String,
    pub ty: String,
    pub count: i64,
    pub first_ns: Option<i64>,
    pub last_ns: Option<i64>,
}

pub struct BagReader {
    // Dropped before the runtime that drives it.
    conn: SqliteConnection,
    runtime: Runtime,
    path: PathBuf,
}

impl BagReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let path = path.as_ref().to_path_buf();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(sqlx::Error::Io)?;
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false)
            .disable_statement_logging();
        let conn = runtime.block_on(options.connect())?;
        Ok(Self { conn, runtime, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Topics whose name matches a `LIKE` pattern (escape char `\`), lowest id first.
    pub fn find_topics(&mut self, pattern: &str) -> Result<Vec<Topic>, sqlx::Error> {
        let conn = &mut self.conn;
        let rows = self.runtime.block_on(
            sqlx::query(r"SELECT id, name FROM topics WHERE name LIKE ? ESCAPE '\' ORDER BY id")
                .bind(pattern)
                .fetch_all(&mut *conn),
        )?;
        rows.iter()
            .map(|row| -> Result<Topic, sqlx::Error> {
                Ok(Topic {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    pub fn count_messages(&mut self, topic_id: i64) -> Result<u64, sqlx::Error> {
        let conn = &mut self.conn;
        let row = self.runtime.block_on(
            sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE topic_id = ?")
                .bind(topic_id)
                .fetch_one(&mut *conn),
        )?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    /// Next page of message headers for `topic_id`, in row order, after `after_id`.
    pub fn message_headers(
        &mut self,
        topic_id: i64,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<MessageHeader>, sqlx::Error> {
        let conn = &mut self.conn;
        let rows = self.runtime.block_on(
            sqlx::query(
                "SELECT id, timestamp FROM messages WHERE topic_id = ? AND id > ? ORDER BY id LIMIT ?",
            )
            .bind(topic_id)
            .bind(after_id)
            .bind(i64::from(limit))
            .fetch_all(&mut *conn),
        )?;
        rows.iter()
            .map(|row| -> Result<MessageHeader, sqlx::Error> {
                Ok(MessageHeader {
                    id: row.try_get("id")?,
                    timestamp: row.try_get("timestamp")?,
                })
            })
            .collect()
    }

    pub fn payload(&mut self, message_id: i64) -> Result<Vec<u8>, sqlx::Error> {
        let conn = &mut self.conn;
        let row = self
            .runtime
            .block_on(
                sqlx::query("SELECT data FROM messages WHERE id = ?")
                    .bind(message_id)
                    .fetch_optional(&mut *conn),
            )?
            .ok_or(sqlx::Error::RowNotFound)?;
        row.try_get("data")
    }

    pub fn topic_stats(&mut self) -> Result<Vec<TopicStat>, sqlx::Error> {
        let conn = &mut self.conn;
        let rows = self.runtime.block_on(
            sqlx::query(
                r#"
SELECT t.name AS name, t.type AS ty, COUNT(m.id) AS n,
       MIN(m.timestamp) AS first_ns, MAX(m.timestamp) AS last_ns
FROM topics t
LEFT JOIN messages m ON m.topic_id = t.id
GROUP BY t.id
ORDER BY t.name
                "#,
            )
            .fetch_all(&mut *conn),
        )?;
        rows.iter()
            .map(|row| -> Result<TopicStat, sqlx::Error> {
                Ok(TopicStat {
                    name: row.try_get("name")?,
                    ty: row.try_get("ty")?,
                    count: row.try_get("n")?,
                    first_ns: row.try_get("first_ns")?,
                    last_ns: row.try_get("last_ns")?,
                })
            })
            .collect()
    }

    pub fn close(self) -> Result<(), sqlx::Error> {
        let Self { conn, runtime, .. } = self;
        runtime.block_on(conn.close())
    }
}

pub fn inspect_bag(path: &str) -> Result<()> {
    let mut reader = BagReader::open(path).with_context(|| format!("failed to open bag: {}", path))?;
    let stats = reader
        .topic_stats()
        .with_context(|| format!("failed to read topic catalog: {}", path))?;
    reader.close()?;

    let bag_start_ns = stats.iter().filter_map(|s| s.first_ns).min();
    let bag_end_ns = stats.iter().filter_map(|s| s.last_ns).max();
    let total: i64 = stats.iter().map(|s| s.count).sum();
    let rel = |ns: Option<i64>| match (ns, bag_start_ns) {
        (Some(ns), Some(start)) => (ns - start) as f64 / 1_000_000_000.0,
        _ => 0.0,
    };
    let duration = rel(bag_end_ns);

    println!("Bag: {}", path);
    println!("Duration (s): {:.6}, Total messages: {}\n", duration, total);

    println!("{:<50} {:<35} {:>7} {:>10} {:>10}", "Topic", "Type", "Count", "Start(s)", "End(s)");
    println!("{}", "-".repeat(116));
    for st in &stats {
        println!(
            "{:<50} {:<35} {:>7} {:>10.6} {:>10.6}",
            st.name,
            st.ty,
            st.count,
            rel(st.first_ns),
            rel(st.last_ns)
        );
    }

    Ok(())
}

//! SQLite backend implementation.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::backend::FrameStore;
use super::records::{FrameRecord, NewVideo, SearchRecord, VideoRecord};
use super::schema::SCHEMA;

/// SQLite-backed frame store. The connection is mutex-guarded so one store can be
/// shared between the request path and background extraction jobs.
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_name: row.get(2)?,
        file_path: PathBuf::from(row.get::<_, String>(3)?),
        duration: row.get(4)?,
        fps: row.get(5)?,
        frames_extracted: row.get::<_, i64>(6)?.max(0) as usize,
        created_at: row.get(7)?,
    })
}

fn search_from_row(row: &Row<'_>) -> rusqlite::Result<SearchRecord> {
    Ok(SearchRecord {
        id: row.get(0)?,
        query_path: PathBuf::from(row.get::<_, String>(1)?),
        results: row.get(2)?,
        created_at: row.get(3)?,
    })
}

const VIDEO_COLUMNS: &str =
    "id, filename, original_name, file_path, duration, fps, frames_extracted, created_at";

impl FrameStore for SqliteDb {
    fn add_video(&self, video: &NewVideo) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO videos (filename, original_name, file_path, duration, fps, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                video.filename,
                video.original_name,
                video.file_path.to_string_lossy(),
                video.duration,
                video.fps,
                now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_video(&self, video_id: i64) -> Result<Option<VideoRecord>> {
        let conn = self.conn()?;
        let video = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS),
                [video_id],
                video_from_row,
            )
            .optional()?;
        Ok(video)
    }

    fn get_all_videos(&self) -> Result<Vec<VideoRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos ORDER BY created_at DESC, id DESC",
            VIDEO_COLUMNS
        ))?;
        let videos = stmt
            .query_map([], video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    fn update_video_frame_count(&self, video_id: i64, count: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE videos SET frames_extracted = ? WHERE id = ?",
            params![count as i64, video_id],
        )?;
        Ok(())
    }

    fn add_frame(
        &self,
        video_id: i64,
        frame_number: u64,
        timestamp: f64,
        frame_path: &Path,
        fingerprint: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO frames (video_id, frame_number, timestamp, frame_path, fingerprint, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                video_id,
                frame_number as i64,
                timestamp,
                frame_path.to_string_lossy(),
                fingerprint,
                now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_video_frames(&self, video_id: i64) -> Result<Vec<FrameRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, video_id, frame_number, timestamp, frame_path, fingerprint
            FROM frames
            WHERE video_id = ?
            ORDER BY frame_number, id
            "#,
        )?;
        let frames = stmt
            .query_map([video_id], |row| {
                Ok(FrameRecord {
                    id: row.get(0)?,
                    video_id: row.get(1)?,
                    frame_number: row.get::<_, i64>(2)?.max(0) as u64,
                    timestamp: row.get(3)?,
                    frame_path: PathBuf::from(row.get::<_, String>(4)?),
                    fingerprint: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(frames)
    }

    fn save_search_record(&self, query_path: &Path, results: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO searches (query_path, results, created_at) VALUES (?, ?, ?)",
            params![query_path.to_string_lossy(), results, now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_search_record(&self, search_id: i64) -> Result<Option<SearchRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT id, query_path, results, created_at FROM searches WHERE id = ?",
                [search_id],
                search_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn recent_searches(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, query_path, results, created_at
            FROM searches
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let records = stmt
            .query_map([limit as i64], search_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteDb {
        let db = SqliteDb::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn sample_video() -> NewVideo {
        NewVideo {
            filename: "abc_clip.mp4".to_string(),
            original_name: "clip.mp4".to_string(),
            file_path: PathBuf::from("/videos/abc_clip.mp4"),
            duration: 10.0,
            fps: 30.0,
        }
    }

    #[test]
    fn test_add_and_get_video() {
        let db = store();
        let id = db.add_video(&sample_video()).unwrap();

        let video = db.get_video(id).unwrap().unwrap();
        assert_eq!(video.original_name, "clip.mp4");
        assert_eq!(video.frames_extracted, 0);
        assert_eq!(video.fps, 30.0);

        assert!(db.get_video(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_frames_ordered_by_frame_number() {
        let db = store();
        let id = db.add_video(&sample_video()).unwrap();

        db.add_frame(id, 60, 2.0, Path::new("/f/2.jpg"), Some("bb")).unwrap();
        db.add_frame(id, 0, 0.0, Path::new("/f/0.jpg"), Some("aa")).unwrap();
        db.add_frame(id, 30, 1.0, Path::new("/f/1.jpg"), None).unwrap();

        let frames = db.get_video_frames(id).unwrap();
        let numbers: Vec<u64> = frames.iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![0, 30, 60]);
        assert_eq!(frames[1].fingerprint, None);
        assert_eq!(frames[2].frame_path, PathBuf::from("/f/2.jpg"));
    }

    #[test]
    fn test_frames_scoped_to_video() {
        let db = store();
        let a = db.add_video(&sample_video()).unwrap();
        let b = db.add_video(&sample_video()).unwrap();

        db.add_frame(a, 0, 0.0, Path::new("/a/0.jpg"), None).unwrap();
        db.add_frame(b, 0, 0.0, Path::new("/b/0.jpg"), None).unwrap();
        db.add_frame(b, 30, 1.0, Path::new("/b/1.jpg"), None).unwrap();

        assert_eq!(db.get_video_frames(a).unwrap().len(), 1);
        assert_eq!(db.get_video_frames(b).unwrap().len(), 2);
        assert!(db.get_video_frames(999).unwrap().is_empty());
    }

    #[test]
    fn test_update_frame_count() {
        let db = store();
        let id = db.add_video(&sample_video()).unwrap();
        db.update_video_frame_count(id, 42).unwrap();
        assert_eq!(db.get_video(id).unwrap().unwrap().frames_extracted, 42);
    }

    #[test]
    fn test_get_all_videos_newest_first() {
        let db = store();
        let first = db.add_video(&sample_video()).unwrap();
        let second = db.add_video(&sample_video()).unwrap();

        let ids: Vec<i64> = db.get_all_videos().unwrap().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_search_log() {
        let db = store();
        let first = db
            .save_search_record(Path::new("/q/one.png"), r#"{"matches_found":0}"#)
            .unwrap();
        let second = db
            .save_search_record(Path::new("/q/two.png"), r#"{"matches_found":3}"#)
            .unwrap();

        let record = db.get_search_record(first).unwrap().unwrap();
        assert_eq!(record.query_path, PathBuf::from("/q/one.png"));

        let recent = db.recent_searches(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second);
    }
}

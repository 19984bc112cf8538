pub const SCHEMA: &str = r#"
-- Videos: one row per ingested video
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,            -- Stored (unique) filename
    original_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    duration REAL NOT NULL DEFAULT 0,  -- Seconds, 0 when the frame rate is unknown
    fps REAL NOT NULL DEFAULT 0,
    frames_extracted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Frames: sampled frames of a video, append-only
CREATE TABLE IF NOT EXISTS frames (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_id INTEGER NOT NULL,
    frame_number INTEGER NOT NULL,     -- Raw frame index in the source video
    timestamp REAL NOT NULL,           -- frame_number / fps
    frame_path TEXT NOT NULL,
    fingerprint TEXT,                  -- md5 of a 64x64 grayscale thumbnail
    created_at TEXT NOT NULL,
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_frames_video ON frames(video_id, frame_number);

-- Search log: append-only
CREATE TABLE IF NOT EXISTS searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_path TEXT NOT NULL,
    results TEXT NOT NULL,             -- JSON search results
    created_at TEXT NOT NULL
);
"#;

mod schema;
pub mod backend;
pub mod records;
pub mod sqlite;

pub use backend::FrameStore;
pub use records::{FrameRecord, NewVideo, SearchRecord, VideoRecord};
pub use schema::SCHEMA;
pub use sqlite::SqliteDb;

//! Out-of-band maintenance: FTS5 rebuilds and full-database backup/restore.

mod backup;
mod fts5_rebuild;

pub use backup::{create_backup, restore_from_backup};
pub use fts5_rebuild::rebuild_fts5_index;

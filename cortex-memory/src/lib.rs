//! Memory repository: CRUD, batch insert, and content-hash dedup for
//! imported text units.

mod list_options;
mod repository;
mod row;

pub use list_options::ListMemoriesOptions;
pub use repository::{MemoryRepository, NewMemory};

pub mod handle_cache;
pub mod records;
pub mod session;
pub mod title;

pub use handle_cache::{AxHandleCache, CacheLimits, CacheStats, HandleCache, IconCache};
pub use records::{ApplicationRecord, Snapshot, WindowRecord};
pub use session::{Selection, SessionKind, SwitcherSession};

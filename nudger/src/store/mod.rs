//! File-backed persistence
//!
//! One directory per user under the data dir:
//!
//! ```text
//! {data_dir}/users/{user_id}/
//!     profile.json
//!     snapshot.json
//!     schedule.json
//!     telegram.json
//!     plans/history.jsonl
//! ```

mod json;

pub use json::{Document, JsonStore, StoreError};

//! Disk-backed backlog: a directory-as-queue for messages that arrived
//! while the database was down, and the loop that drains it.

mod drain;
mod store;

pub use drain::BacklogDrainer;
pub use store::BacklogStore;

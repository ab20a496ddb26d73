pub mod backup_exchange;
pub mod core;
pub mod documents;
pub mod relationships;
pub mod rosters;

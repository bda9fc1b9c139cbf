pub mod errors;
pub mod merge;
pub mod models;
pub mod providers;
pub mod session;

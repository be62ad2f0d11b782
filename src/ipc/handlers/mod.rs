pub mod assignments;
pub mod auth;
pub mod backup;
pub mod classes;
pub mod core;
pub mod grades;
pub mod profile;
pub mod stats;
pub mod theme;

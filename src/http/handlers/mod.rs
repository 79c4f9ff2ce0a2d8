pub mod attendance;
pub mod auth;
pub mod classes;
pub mod core;
pub mod grades;
pub mod settings;
pub mod students;

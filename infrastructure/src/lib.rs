pub mod persistence;

// Re-export implementations for easier use in the api crate
pub use persistence::{InMemoryStudentRepository, JsonFileStudentRepository};

pub mod in_memory_repository;
pub mod json_file_repository;

// Re-export both repository types
pub use in_memory_repository::InMemoryStudentRepository;
pub use json_file_repository::JsonFileStudentRepository;

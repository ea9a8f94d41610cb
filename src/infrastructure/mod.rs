pub mod in_memory_backend;
pub mod rest_backend;

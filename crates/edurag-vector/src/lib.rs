pub mod memory;
pub mod schema;
pub mod store;
pub mod table;

pub use memory::MemoryIndex;
pub use store::LanceVectorStore;

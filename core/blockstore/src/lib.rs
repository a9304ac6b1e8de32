pub mod memory;

pub use memory::MemoryBlockstore;

mod file;
mod memory;

pub use file::FileMedium;
pub use memory::MemoryMedium;

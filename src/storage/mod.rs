pub mod memory;
pub mod traits;

pub use memory::MemoryResolutionCache;
pub use traits::ResolutionCache;

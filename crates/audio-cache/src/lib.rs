//! # audio-cache
//!
//! Audio cache backends shared by the launcher and the services around it.
//!
//! Entries are `(samples, sample_rate)` pairs addressed by
//! `(Stage, session id, item id)`. Backends:
//!
//! - [`FileCache`]: float WAV files under a root directory
//! - [`MemoryCache`]: an in-process map
//!
//! [`select_cache_implementation`] maps a [`CacheBackend`] name to one of them.

pub mod file;
pub mod memory;
pub mod registry;
pub mod wav;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use registry::{CacheBackend, select_cache_implementation};
pub use wav::{read_wav, write_wav};

//! # imaging-memory
//!
//! Process-wide block arena backing the pixel buffers of an imaging library.
//!
//! Image rows are packed into fixed-size blocks. Blocks released by one
//! image are cached and handed to the next one, so a workload that opens
//! and closes many images of similar size stops hitting the system
//! allocator once the cache is warm.
//!
//! ## Quick Start
//!
//! ```rust
//! use imaging_memory::prelude::*;
//!
//! # fn main() -> MemoryResult<()> {
//! let arena = Arena::new();
//! arena.set_block_size(4096)?;
//! arena.set_blocks_max(64)?;
//!
//! // 256 lines of 1024 bytes: four lines per block, 64 blocks
//! let image = arena.allocate_lines(1024, 256)?;
//! assert_eq!(image.block_count(), 64);
//! drop(image);
//!
//! assert_eq!(arena.stats().blocks_cached, 64);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! The [global arena](Arena::global) reads `IMAGING_ALIGNMENT`,
//! `IMAGING_BLOCK_SIZE` and `IMAGING_BLOCKS_MAX` from the process
//! environment the first time it is used. See [`env`] for the value syntax.
//!
//! ## Features
//!
//! - `serde`: `Serialize` for [`ArenaConfig`] and [`ArenaStats`]

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
// Precision loss in usize -> f64 casts is acceptable for statistics
#![allow(clippy::cast_precision_loss)]
// Size suffixes are multiplied as i64, values are range-checked afterwards
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::return_self_not_must_use)]

// Error types
pub mod error;

// Core modules
pub mod arena;
pub mod env;
pub mod utils;

pub use crate::arena::{Arena, ArenaConfig, ArenaStats, Block, LargeAllocation, PixelBuffer};
pub use crate::env::{EnvLoader, EnvReport, EnvWarning};
pub use crate::error::{MemoryError, MemoryResult, Result};

use tracing::{debug, info};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::arena::{Arena, ArenaConfig, ArenaStats, PixelBuffer};
    pub use crate::env::{EnvLoader, EnvReport};
    pub use crate::error::{MemoryError, MemoryResult};
}

/// Initializes the global arena.
///
/// Reads the environment configuration immediately instead of on the first
/// allocation, which keeps configuration warnings near program start.
///
/// # Examples
///
/// ```rust
/// fn main() -> imaging_memory::MemoryResult<()> {
///     imaging_memory::init()?;
///
///     // Your application code here
///
///     imaging_memory::shutdown();
///     Ok(())
/// }
/// ```
pub fn init() -> MemoryResult<()> {
    debug!("Initializing imaging-memory");

    let arena = Arena::global();

    info!(config = %arena.config(), "imaging-memory initialized");
    Ok(())
}

/// Frees every block cached by the global arena.
///
/// Outstanding buffers are unaffected. Safe to call when the global arena
/// was never initialized.
pub fn shutdown() {
    if let Some(arena) = Arena::try_global() {
        let freed = arena.clear_cache(0);
        info!(freed, "imaging-memory shutdown complete");
    }
}

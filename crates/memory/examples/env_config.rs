//! Configures an arena from environment-style variables and prints the
//! resulting configuration and statistics as JSON.
//!
//! ```text
//! IMAGING_BLOCKS_MAX=2K IMAGING_BLOCK_SIZE=64k \
//!     cargo run -p imaging-memory --example env_config --features serde
//! ```

use imaging_memory::prelude::*;
use imaging_memory::env::ENV_PREFIX;
use tracing_subscriber::EnvFilter;

fn main() -> MemoryResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let arena = Arena::new();
    let report = EnvLoader::with_prefix(ENV_PREFIX).apply_process_env(&arena);
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }

    println!("config: {}", serde_json::to_string_pretty(&arena.config()).unwrap());

    for _ in 0..4 {
        arena.allocate_lines(1024, 256)?.release();
    }
    arena.clear_cache(arena.blocks_max() / 2);

    println!("stats: {}", serde_json::to_string_pretty(&arena.stats()).unwrap());
    Ok(())
}

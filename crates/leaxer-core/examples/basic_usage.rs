//! Basic usage example - detect compute backends for a bundled binary tree

use leaxer_core::{
    ArchBinDir, BackendResolver, DetectionCache, MemorySettings, Platform, Result, SystemProbes,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Get bin root and preference from args
    let root = std::env::args().nth(1).unwrap_or_else(|| "./bin".to_string());
    let preference = std::env::args().nth(2).unwrap_or_else(|| "auto".to_string());

    println!("Probing hardware with binaries under: {}", root);

    let bins = Arc::new(ArchBinDir::new(&root));
    let resolver = Arc::new(BackendResolver::new(
        Platform::current(),
        Arc::new(SystemProbes::new(bins)),
        Arc::new(MemorySettings::with("compute_backend", preference.clone())),
        Arc::new(DetectionCache::new()),
    ));
    resolver.prewarm().await;

    let available = resolver.available_backends();
    println!("Available backends:");
    for backend in &available {
        println!("  - {}", backend);
    }
    println!("'{}' resolves to {}", preference, resolver.get_backend());

    let info = resolver.gpu_info();
    println!("{} GPU device(s) on {}", info.device_count(), info.platform);

    Ok(())
}

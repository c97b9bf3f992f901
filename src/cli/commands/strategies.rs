//! List strategies command.

use anyhow::Result;
use pulse_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ({})", info.name, info.id);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  Minimum history: {} bars", info.min_bars);
        println!();
    }

    println!("Use --strategy <id> to filter the signal listing.");

    Ok(())
}

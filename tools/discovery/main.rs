/*
 * Lamp Discovery Tool
 *
 * Scans all available serial ports and identifies connected
 * HL-2000-HP-232R lamps by sending the safe `VER` identification query.
 *
 * ARCHITECTURAL WARNING:
 * Do not run this scan while a lamp session is active!
 * 1. Latency: probing ports sequentially blocks for the per-port timeout.
 * 2. Safety: probe bytes landing on unrelated instruments at a mismatched
 *    baud rate can be interpreted as junk commands.
 * Run this ONCE at startup or via a manual configuration step.
 */

use hl2000_lamp::config::Settings;
use hl2000_lamp::discovery;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new(None).unwrap_or_default();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log_level),
    )
    .init();

    println!("🔍 Starting lamp discovery scan...");

    let lamps = discovery::list_candidates(&settings.serial).await?;

    if lamps.is_empty() {
        println!("❌ No lamp detected on this system.");
        return Ok(());
    }

    for lamp in lamps.values() {
        println!(
            "✅ FOUND: {}: {}{}",
            lamp.port_name,
            lamp.firmware_version,
            lamp.description
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

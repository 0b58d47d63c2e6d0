/*
 * Responsibility
 * - tokio runtime entry point
 * - call app::run() (no logic lives here)
 */
use anyhow::Result;

use bearer_gate::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}

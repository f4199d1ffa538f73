use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Installs a fmt subscriber at `level`; `None` keeps logging off.
pub fn init(level: Option<Level>) -> Result<()> {
    let Some(level) = level else {
        return Ok(());
    };
    let _ = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}

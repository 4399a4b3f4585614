//! `neural-core watch` - live scoring on file changes
//!
//! Runs the event loop on a current-thread runtime until Ctrl+C.

use anyhow::{Context, Result};
use console::style;
use neural_core::app::{AppContext, Collaborators};
use neural_core::config::load_project_config;
use neural_core::publisher::BroadcastPublisher;
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Status updates buffered for the terminal printer
const UPDATE_BUFFER: usize = 16;

pub fn run(path: &Path, no_initial_run: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let mut config = load_project_config(&root);
    if no_initial_run {
        config.tests.run_on_start = false;
    }

    println!(
        "\n{}Watching {} for changes...\n",
        style("◉ ").bold(),
        style(root.display()).cyan()
    );
    for dir in &config.watch.directories {
        println!("  {} {}", style("→").dim(), dir);
    }
    println!("  {} Press Ctrl+C to stop\n", style("→").dim());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(async move {
        let mut collaborators = Collaborators::from_config(&root, &config);
        let broadcast = BroadcastPublisher::new(UPDATE_BUFFER);
        let mut updates = broadcast.subscribe();
        collaborators.publishers.push(Box::new(broadcast));

        let mut ctx = AppContext::init(&root, config, collaborators)?;
        let shown_root = ctx.root().to_path_buf();
        ctx.on_change(move |event| {
            let rel = event.path.strip_prefix(&shown_root).unwrap_or(&event.path);
            println!("  {} {} {}", style("Δ").dim(), event.kind, rel.display());
            Ok(())
        });

        let token = ctx.handle().shutdown_token();
        tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), token));

        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(status) => super::status::print_status(&status),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Terminal fell behind; skipped {} status update(s)", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        ctx.run().await
    });

    // A test run still executing on the blocking pool is abandoned here
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Cancel `token` once `signal` fires. A signal that cannot be registered
/// leaves the token alone so watching continues.
async fn cancel_on_signal(signal: impl Future<Output = io::Result<()>>, token: CancellationToken) {
    match signal.await {
        Ok(()) => println!("\n{}", style("Stopping...").dim()),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_cancels_token() {
        let token = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, token.clone()).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_signal_registration_keeps_watching() {
        let token = CancellationToken::new();
        cancel_on_signal(
            async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) },
            token.clone(),
        )
        .await;
        assert!(!token.is_cancelled());
    }
}

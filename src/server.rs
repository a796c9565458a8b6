//! Report preview server: serve the output tree with live reload.

use std::path::Path;

use axum::Router;
use notify::{Event, RecursiveMode, Watcher};
use tower_http::services::ServeDir;
use tower_livereload::LiveReloadLayer;

/// Serve `root` (the directory containing `testOutput/` and the shared
/// stylesheet) with live reload on file changes, so a report can be watched
/// while a run is still writing it.
pub async fn serve(root: &Path, port: u16) -> anyhow::Result<()> {
    // Create live reload layer
    let livereload = LiveReloadLayer::new();
    let reloader = livereload.reloader();

    // Reload browsers whenever a run writes new images or reports
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                reloader.reload();
            }
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    // Build the router
    let app = Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(livereload);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Report server running at http://localhost:{port}");
    println!("Watching {} for changes...", root.display());
    println!("Press Ctrl+C to stop");

    // Keep watcher alive
    let _watcher = watcher;

    axum::serve(listener, app).await?;

    Ok(())
}

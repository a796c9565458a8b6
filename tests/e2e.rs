//! End-to-end browser runs against served fixture deployments.
//!
//! ## Setup
//! Install Playwright browsers matching the version bundled with playwright-rs:
//! ```bash
//! npx playwright@1.56.1 install
//! ```
//!
//! ## Running
//! These tests launch real browsers and are ignored by default:
//! `cargo test --test e2e -- --ignored`

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tokio::sync::oneshot;

/// Find an available port for a fixture server.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

/// A minimal deployment fixture: header, content, footer.
fn fixture_page(header_background: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><style>
  #header {{ width: 100%; height: 120px; background: {header_background}; }}
  #footer {{ width: 100%; height: 80px; background: #333333; }}
  main {{ min-height: 200px; }}
</style></head>
<body><div id="header"></div><main>fixture content</main><div id="footer"></div></body>
</html>"#
    )
}

fn write_fixture(dir: &Path, header_background: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("index.html"), fixture_page(header_background)).unwrap();
}

/// Serve a fixture directory; `?id=` query strings fall through to index.html.
async fn start_server(dir: PathBuf, port: u16, shutdown_rx: oneshot::Receiver<()>) {
    use axum::Router;
    use tower_http::services::ServeDir;

    let app = Router::new().fallback_service(ServeDir::new(dir));

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}"))
        .await
        .expect("Failed to bind server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .expect("Server error");
}

/// Run sitediff against two served fixtures and return the engine output
/// directory plus the report HTML.
async fn run_sitediff(
    scratch: &Path,
    old_background: &str,
    new_background: &str,
) -> (PathBuf, String) {
    let old_dir = scratch.join("old-site");
    let new_dir = scratch.join("new-site");
    write_fixture(&old_dir, old_background);
    write_fixture(&new_dir, new_background);

    let old_port = find_available_port();
    let new_port = find_available_port();
    let (old_tx, old_rx) = oneshot::channel();
    let (new_tx, new_rx) = oneshot::channel();
    let old_server = tokio::spawn(start_server(old_dir, old_port, old_rx));
    let new_server = tokio::spawn(start_server(new_dir, new_port, new_rx));

    // Give the fixture servers time to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    let config_path = scratch.join("pageList.json");
    fs::write(
        &config_path,
        format!(
            r##"{{
  "PageIds": {{ "1": "req-1" }},
  "SectionSelectors": {{ "header": "#header" }},
  "Urls": {{ "Old": "http://127.0.0.1:{old_port}", "New": "http://127.0.0.1:{new_port}" }}
}}"##
        ),
    )
    .unwrap();

    let output_root = scratch.join("testOutput");
    let config_arg = config_path.to_str().unwrap().to_string();
    let output_arg = output_root.to_str().unwrap().to_string();
    let status = tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_sitediff"))
            .args(["run", "--config", &config_arg, "--output", &output_arg])
            .status()
            .expect("Failed to execute sitediff")
    })
    .await
    .expect("sitediff task panicked");
    assert!(status.success(), "sitediff run failed");

    let _ = old_tx.send(());
    let _ = new_tx.send(());
    let _ = old_server.await;
    let _ = new_server.await;

    // Exactly one timestamped run folder, with one engine subfolder
    let run_dir = fs::read_dir(&output_root)
        .expect("run folder missing")
        .map(|entry| entry.unwrap().path())
        .next()
        .expect("run folder empty");
    let engine_dir = run_dir.join("chromium");
    let html = fs::read_to_string(engine_dir.join("output.html")).expect("output.html missing");
    (engine_dir, html)
}

#[test]
#[ignore = "requires installed Playwright browsers"]
fn identical_deployments_pass_every_viewport() {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    rt.block_on(async {
        let scratch = tempfile::tempdir().unwrap();
        let (engine_dir, html) = run_sitediff(scratch.path(), "#4a6da7", "#4a6da7").await;

        for viewport in ["Desktop", "Tablet", "Mobile"] {
            for suffix in ["prod", "dev", "diff"] {
                let image = engine_dir.join(format!("1-header-{viewport}-{suffix}.png"));
                assert!(image.exists(), "missing {}", image.display());
            }
        }

        assert_eq!(
            html.matches("Test passed, no diff detected").count(),
            3,
            "all three viewport entries should pass"
        );
        assert!(!html.contains("<img"));

        // The shared stylesheet lands beside testOutput
        assert!(scratch.path().join("visual-regression.css").exists());
    });
}

#[test]
#[ignore = "requires installed Playwright browsers"]
fn recolored_header_renders_triptychs() {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    rt.block_on(async {
        let scratch = tempfile::tempdir().unwrap();
        let (engine_dir, html) = run_sitediff(scratch.path(), "#4a6da7", "#a74a4a").await;

        assert!(!html.contains("Test passed, no diff detected"));
        // Three viewports, three images each
        assert_eq!(html.matches("<img").count(), 9);
        for viewport in ["Desktop", "Tablet", "Mobile"] {
            assert!(html.contains(&format!("1-header-{viewport}-dev.png")));
            assert!(html.contains(&format!("1-header-{viewport}-prod.png")));
            assert!(html.contains(&format!("1-header-{viewport}-diff.png")));
            assert!(
                engine_dir
                    .join(format!("1-header-{viewport}-diff.png"))
                    .exists()
            );
        }
    });
}

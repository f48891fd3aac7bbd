mod common;

use std::{sync::Arc, time::Duration};

use sitebox::{
    config::{Credentials, SiteboxConfig},
    models::RuntimeStatus,
    registry::HttpRegistry,
    runtime::{ContentSaver, GenerationPhase, RuntimeCoordinator},
    sandbox::{NativeSandbox, PortEvent, SandboxBoot},
};
use tempfile::TempDir;
use tokio::fs;

use common::{start_backend, FakeBackend};

async fn project_dir() -> anyhow::Result<TempDir> {
    let dir = TempDir::new()?;
    fs::create_dir_all(dir.path().join("src")).await?;
    fs::create_dir_all(dir.path().join("node_modules/vite")).await?;
    fs::write(dir.path().join("index.html"), "<div id=\"app\"></div>").await?;
    fs::write(dir.path().join("src/main.ts"), "mount('#app')").await?;
    fs::write(dir.path().join("node_modules/vite/index.js"), "export {}").await?;
    fs::write(dir.path().join("npm-debug.log"), "oops").await?;
    Ok(dir)
}

async fn setup(dir: &TempDir) -> anyhow::Result<(FakeBackend, NativeSandbox, RuntimeCoordinator)> {
    let (backend, base_url) = start_backend().await;
    let config = SiteboxConfig::builder()
        .api_base_url(base_url)
        .credentials(Credentials::Cookie("sid=abc".to_string()))
        .default_project_id("p1")
        .boot_timeout(Some(Duration::from_secs(5)))
        .build();

    let registry = Arc::new(HttpRegistry::from_config(&config)?);
    let sandbox = NativeSandbox::boot(dir.path()).await?;
    let coordinator = RuntimeCoordinator::new(registry, SandboxBoot::ready(sandbox.clone()), config);
    Ok((backend, sandbox, coordinator))
}

#[test_log::test(tokio::test)]
async fn test_generation_cycle_persists_snapshot() -> anyhow::Result<()> {
    let dir = project_dir().await?;
    let (backend, _sandbox, coordinator) = setup(&dir).await?;
    let saver = ContentSaver::new(coordinator.clone());

    assert!(!saver.save_content(None).await);
    assert!(backend.registry.calls().await.is_empty());

    let id = coordinator.ensure_registered(None).await.unwrap();
    assert_eq!(coordinator.phase().await, GenerationPhase::Registered);
    assert!(saver.save_content(None).await);
    assert_eq!(coordinator.phase().await, GenerationPhase::Saved);

    let record = backend.registry.record(&id).await.unwrap();
    assert_eq!(record.project_id, "p1");
    assert_eq!(record.status, RuntimeStatus::Active);

    let files = record.metadata.unwrap().file_map();
    assert_eq!(
        files.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["/index.html", "/src/main.ts"]
    );
    assert_eq!(files["/src/main.ts"], "mount('#app')");
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_concurrent_callers_share_one_record() -> anyhow::Result<()> {
    let dir = project_dir().await?;
    let (backend, _sandbox, coordinator) = setup(&dir).await?;

    let (a, b, c) = tokio::join!(
        coordinator.ensure_registered(Some("p7")),
        coordinator.ensure_registered(Some("p7")),
        coordinator.ensure_registered(None),
    );

    assert!(a.is_some());
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(backend.registry.create_count().await, 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_port_events_reach_the_record() -> anyhow::Result<()> {
    let dir = project_dir().await?;
    let (backend, sandbox, coordinator) = setup(&dir).await?;
    let id = coordinator.ensure_registered(None).await.unwrap();

    let mut ports = Vec::new();
    for _ in 0..100 {
        let record = backend.registry.record(&id).await.unwrap();
        ports = record.metadata.map(|m| m.ports).unwrap_or_default();
        if !ports.is_empty() {
            break;
        }

        sandbox.announce_port(PortEvent::open(5173, "http://127.0.0.1:5173"));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(ports, vec![5173]);
    let record = backend.registry.record(&id).await.unwrap();
    assert_eq!(
        record.metadata.unwrap().url.as_deref(),
        Some("http://127.0.0.1:5173")
    );
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_attach_saves_into_existing_record() -> anyhow::Result<()> {
    let dir = project_dir().await?;
    let (backend, _sandbox, first) = setup(&dir).await?;
    let id = first.ensure_registered(None).await.unwrap();

    let config = first.config().clone();
    let registry = Arc::new(HttpRegistry::from_config(&config)?);
    let boot = SandboxBoot::spawn(NativeSandbox::boot(dir.path().to_path_buf()));
    let second = RuntimeCoordinator::new(registry, boot, config);

    fs::write(dir.path().join("src/extra.ts"), "extra").await?;
    second.attach(&id).await?;
    assert!(ContentSaver::new(second).save_content(None).await);

    assert_eq!(backend.registry.create_count().await, 1);
    let files = backend.registry.record(&id).await.unwrap().metadata.unwrap().file_map();
    assert!(files.contains_key("/src/extra.ts"));
    Ok(())
}

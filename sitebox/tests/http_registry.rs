mod common;

use serde_json::json;
use sitebox::{
    config::Credentials,
    models::{CreateRuntimeRequest, MetadataPatch, RuntimeMetadata, RuntimeStatus, UpdateRuntimeRequest},
    registry::{HttpRegistry, RuntimeRegistry},
    SiteboxError,
};

use common::{start_backend, BROKEN_ID};

fn create_request(project_id: &str) -> CreateRuntimeRequest {
    CreateRuntimeRequest::builder()
        .project_id(project_id)
        .name("WebContainer-1700000000000")
        .description("Generated web container for project development")
        .metadata(RuntimeMetadata::new("project"))
        .build()
}

#[test_log::test(tokio::test)]
async fn test_get_missing_record_is_none() -> anyhow::Result<()> {
    let (_backend, base_url) = start_backend().await;
    let registry = HttpRegistry::new(&base_url, &Credentials::Anonymous)?;

    assert_eq!(registry.get("wc_404").await?, None);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_server_error_is_transport_error() -> anyhow::Result<()> {
    let (_backend, base_url) = start_backend().await;
    let registry = HttpRegistry::new(&base_url, &Credentials::Anonymous)?;

    let err = registry.get(BROKEN_ID).await.unwrap_err();
    match err {
        SiteboxError::Transport { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_record_lifecycle_over_http() -> anyhow::Result<()> {
    let (backend, base_url) = start_backend().await;
    let registry = HttpRegistry::new(&base_url, &Credentials::Bearer("tok".to_string()))?;

    let record = registry.create(&create_request("p1")).await?;
    assert_eq!(record.project_id, "p1");
    assert_eq!(record.status, RuntimeStatus::Creating);

    let updated = registry
        .update(&record.id, &UpdateRuntimeRequest::status(RuntimeStatus::Active))
        .await?;
    assert_eq!(updated.status, RuntimeStatus::Active);

    let patch = MetadataPatch {
        ports: Some(vec![5173]),
        url: Some("http://localhost:5173".to_string()),
        ..Default::default()
    };
    registry
        .update(&record.id, &UpdateRuntimeRequest::metadata(patch))
        .await?;

    let fetched = registry.get(&record.id).await?.unwrap();
    let metadata = fetched.metadata.unwrap();
    assert_eq!(metadata.ports, vec![5173]);
    assert_eq!(metadata.workdir_name, "project");

    registry.create(&create_request("p2")).await?;
    let listed = registry.list_by_project("p1").await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);

    registry.delete(&record.id).await?;
    assert_eq!(registry.get(&record.id).await?, None);

    let authorizations = backend.authorizations.lock().await;
    assert!(!authorizations.is_empty());
    assert!(authorizations.iter().all(|auth| auth.as_deref() == Some("Bearer tok")));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_update_body_omits_unset_fields() -> anyhow::Result<()> {
    let (backend, base_url) = start_backend().await;
    let registry = HttpRegistry::new(&base_url, &Credentials::Anonymous)?;
    let record = registry.create(&create_request("p1")).await?;

    registry
        .update(&record.id, &UpdateRuntimeRequest::status(RuntimeStatus::Active))
        .await?;

    let bodies = backend.update_bodies.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({ "status": "active" })]);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_update_missing_record_is_transport_404() -> anyhow::Result<()> {
    let (_backend, base_url) = start_backend().await;
    let registry = HttpRegistry::new(&base_url, &Credentials::Anonymous)?;

    let err = registry
        .update("wc_missing", &UpdateRuntimeRequest::status(RuntimeStatus::Active))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    Ok(())
}

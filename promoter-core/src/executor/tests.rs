use super::*;
use crate::auth::AnonymousCredentialProvider;
use crate::inventory::MasterInventory;
use crate::model::{ImageEntry, RegistryContext, Tag};
use std::str::FromStr;

fn digest(last: char) -> crate::digest::Digest {
    let hex = std::iter::repeat(last).take(64).collect::<String>();
    crate::digest::Digest::from_str(&format!("sha256:{}", hex)).unwrap()
}

fn manifest_for(source_url: &str, dst_url: &str, image: &str) -> Manifest {
    Manifest::new(
        vec![
            RegistryContext {
                name: source_url.parse().unwrap(),
                service_account_hint: None,
                is_source: true,
            },
            RegistryContext {
                name: dst_url.parse().unwrap(),
                service_account_hint: None,
                is_source: false,
            },
        ],
        vec![ImageEntry {
            name: ImageName::new(image).unwrap(),
            dmap: crate::model::DMap::new(),
        }],
    )
}

#[tokio::test]
async fn test_dry_run_produces_would_do_without_dispatching() {
    let source = mockito::Server::new_async().await;
    let dst = mockito::Server::new_async().await;
    let manifest = manifest_for(&source.url(), &dst.url(), "foo");

    let edge = PromotionEdge::add(
        dst.url().parse().unwrap(),
        ImageName::new("foo").unwrap(),
        Tag::new("1.0").unwrap(),
        digest('a'),
    );

    let executor = Executor::new(Arc::new(AnonymousCredentialProvider));
    let run_ctx = RunContext::new(crate::config::RunConfig::default());
    let master = MasterInventory::new();
    let options = ExecutorOptions {
        confirm: false,
        ..ExecutorOptions::default()
    };

    let report = executor
        .execute(&manifest, vec![edge], &master, &run_ctx, &options)
        .await
        .unwrap();

    assert_eq!(report.would_do_count(), 1);
    assert_eq!(report.succeeded_count(), 0);
    assert!(report.dry_run);
}

#[tokio::test]
async fn test_confirm_mode_executes_add_edge_successfully() {
    let mut source = mockito::Server::new_async().await;
    let mut dst = mockito::Server::new_async().await;
    let manifest = manifest_for(&source.url(), &dst.url(), "foo");

    let hex = "a".repeat(64);
    source
        .mock("GET", format!("/v2/foo/manifests/sha256:{}", hex).as_str())
        .with_status(200)
        .with_header("content-type", "application/vnd.oci.image.manifest.v1+json")
        .with_header("Docker-Content-Digest", format!("sha256:{}", hex).as_str())
        .with_body("{}")
        .create_async()
        .await;
    dst.mock("PUT", "/v2/foo/manifests/1.0")
        .with_status(201)
        .create_async()
        .await;

    let edge = PromotionEdge::add(
        dst.url().parse().unwrap(),
        ImageName::new("foo").unwrap(),
        Tag::new("1.0").unwrap(),
        digest('a'),
    );

    let executor = Executor::new(Arc::new(AnonymousCredentialProvider));
    let run_ctx = RunContext::new(crate::config::RunConfig::default());
    let master = MasterInventory::new();
    let options = ExecutorOptions {
        confirm: true,
        ..ExecutorOptions::default()
    };

    let report = executor
        .execute(&manifest, vec![edge], &master, &run_ctx, &options)
        .await
        .unwrap();

    assert_eq!(report.succeeded_count(), 1);
    assert!(report.is_success());
    assert!(run_ctx.counter.total() >= 2);
}

#[tokio::test]
async fn test_confirm_mode_classifies_permanent_failure_without_retrying() {
    let mut source = mockito::Server::new_async().await;
    let dst = mockito::Server::new_async().await;
    let manifest = manifest_for(&source.url(), &dst.url(), "foo");

    let hex = "b".repeat(64);
    let mock = source
        .mock("GET", format!("/v2/foo/manifests/sha256:{}", hex).as_str())
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let edge = PromotionEdge::add(
        dst.url().parse().unwrap(),
        ImageName::new("foo").unwrap(),
        Tag::new("1.0").unwrap(),
        digest('b'),
    );

    let executor = Executor::new(Arc::new(AnonymousCredentialProvider));
    let run_ctx = RunContext::new(crate::config::RunConfig::default());
    let master = MasterInventory::new();
    let options = ExecutorOptions {
        confirm: true,
        retry_attempts: 5,
        initial_backoff_ms: 1,
        ..ExecutorOptions::default()
    };

    let report = executor
        .execute(&manifest, vec![edge], &master, &run_ctx, &options)
        .await
        .unwrap();

    assert_eq!(report.failed_count(), 1);
    assert!(!report.is_success());
    assert_eq!(report.results[0].attempts, 1, "permanent failures must not retry");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pre_check_failure_aborts_before_any_edge_executes() {
    let source = mockito::Server::new_async().await;
    let dst = mockito::Server::new_async().await;
    let manifest = manifest_for(&source.url(), &dst.url(), "foo");

    let edge = PromotionEdge::add(
        dst.url().parse().unwrap(),
        ImageName::new("foo").unwrap(),
        Tag::new("1.0").unwrap(),
        digest('c'),
    );

    let failing_check = Arc::new(precheck::SizeCheck::new(0));
    let executor = Executor::new(Arc::new(AnonymousCredentialProvider)).with_pre_checks(vec![failing_check]);
    let run_ctx = RunContext::new(crate::config::RunConfig::default());
    let master = MasterInventory::new();
    let options = ExecutorOptions::default();

    let result = executor.execute(&manifest, vec![edge], &master, &run_ctx, &options).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_empty_edge_set_produces_empty_report() {
    let source = mockito::Server::new_async().await;
    let dst = mockito::Server::new_async().await;
    let manifest = manifest_for(&source.url(), &dst.url(), "foo");

    let executor = Executor::new(Arc::new(AnonymousCredentialProvider));
    let run_ctx = RunContext::new(crate::config::RunConfig::default());
    let master = MasterInventory::new();
    let options = ExecutorOptions::default();

    let report = executor.execute(&manifest, vec![], &master, &run_ctx, &options).await.unwrap();
    assert!(report.results.is_empty());
    assert!(report.is_success());
}

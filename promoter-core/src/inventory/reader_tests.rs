use super::*;
use crate::auth::AnonymousCredentialProvider;
use crate::manifest::schema::Manifest;
use crate::model::{ImageEntry, RegistryContext};

fn registry_context(name: &str) -> RegistryContext {
    RegistryContext {
        name: name.parse().unwrap(),
        service_account_hint: None,
        is_source: true,
    }
}

#[tokio::test]
async fn test_read_builds_inventory_from_tags_list_manifest_field() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/kube-apiserver/tags/list")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "name": "kube-apiserver",
                "tags": ["v1.19.0"],
                "manifest": {
                    "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa": {
                        "imageSizeBytes": "1024",
                        "mediaType": "application/vnd.oci.image.manifest.v1+json",
                        "tag": ["v1.19.0"]
                    }
                }
            }"#,
        )
        .create_async()
        .await;

    let manifest = Manifest::new(
        vec![registry_context(&server.url())],
        vec![ImageEntry {
            name: crate::model::ImageName::new("kube-apiserver").unwrap(),
            dmap: crate::model::DMap::new(),
        }],
    );

    let reader = InventoryReader::new(std::sync::Arc::new(AnonymousCredentialProvider));
    let counter = crate::ratelimit::RequestCounter::with_defaults();
    let cancellation = CancellationToken::new();

    let master = reader
        .read(&manifest, &counter, &cancellation, &ReaderOptions::default())
        .await
        .unwrap();

    let registry: Registry = server.url().parse().unwrap();
    let inventory = master.get(&registry).unwrap();
    let image = inventory.images.get(&ImageName::new("kube-apiserver").unwrap()).unwrap();
    assert_eq!(image.dmap.len(), 1);
    assert!(counter.total() >= 1);
}

#[tokio::test]
async fn test_read_allows_partial_when_repo_unreachable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/broken/tags/list")
        .with_status(500)
        .create_async()
        .await;

    let manifest = Manifest::new(
        vec![registry_context(&server.url())],
        vec![ImageEntry {
            name: crate::model::ImageName::new("broken").unwrap(),
            dmap: crate::model::DMap::new(),
        }],
    );

    let reader = InventoryReader::new(std::sync::Arc::new(AnonymousCredentialProvider));
    let counter = crate::ratelimit::RequestCounter::with_defaults();
    let cancellation = CancellationToken::new();
    let options = ReaderOptions {
        retry_attempts: 1,
        allow_partial: true,
        ..ReaderOptions::default()
    };

    let master = reader.read(&manifest, &counter, &cancellation, &options).await.unwrap();
    let registry: Registry = server.url().parse().unwrap();
    let inventory = master.get(&registry).unwrap();
    assert_eq!(inventory.unreachable_repositories, vec!["broken".to_string()]);
}

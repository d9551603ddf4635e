use super::*;
use crate::digest::Digest;
use crate::inventory::{Inventory, MasterInventory, RegInvImage};
use crate::manifest::schema::Manifest;
use crate::model::{DMap, ImageEntry, ImageName, Registry, RegistryContext, Tag};
use std::collections::BTreeSet;
use std::str::FromStr;

fn digest(last: char) -> Digest {
    let hex = std::iter::repeat(last).take(64).collect::<String>();
    Digest::from_str(&format!("sha256:{}", hex)).unwrap()
}

fn registry(name: &str) -> Registry {
    Registry::new(name).unwrap()
}

fn tags(names: &[&str]) -> BTreeSet<Tag> {
    names.iter().map(|t| Tag::new(*t).unwrap()).collect()
}

fn manifest_with_source_digest(source: &str, dest: &str, image: &str, digest_val: Digest, tag_names: &[&str]) -> Manifest {
    let mut dmap = DMap::new();
    dmap.insert(digest_val, tags(tag_names));
    Manifest::new(
        vec![
            RegistryContext { name: registry(source), service_account_hint: None, is_source: true },
            RegistryContext { name: registry(dest), service_account_hint: None, is_source: false },
        ],
        vec![ImageEntry { name: ImageName::new(image).unwrap(), dmap }],
    )
}

fn inventory_with(image: &str, digest_val: Digest, tag_names: &[&str]) -> Inventory {
    let mut inv = Inventory::default();
    let mut reg_inv = RegInvImage::new(ImageName::new(image).unwrap());
    reg_inv.dmap.insert(digest_val, tags(tag_names));
    inv.images.insert(reg_inv.name.clone(), reg_inv);
    inv
}

#[test]
fn test_reconcile_emits_add_when_destination_missing_tag() {
    let manifest = manifest_with_source_digest("src.example", "dst.example", "kube-apiserver", digest('a'), &["v1.19.0"]);

    let mut master = MasterInventory::new();
    master.insert(registry("src.example"), inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]));
    master.insert(registry("dst.example"), Inventory::default());

    let outcome = reconcile(&manifest, &master, &PlannerOptions::default());
    assert_eq!(outcome.edges.len(), 1);
    assert_eq!(outcome.edges[0].op, Op::Add);
    assert_eq!(outcome.summary.total().add, 1);
}

#[test]
fn test_reconcile_emits_move_when_destination_tag_points_elsewhere() {
    let manifest = manifest_with_source_digest("src.example", "dst.example", "kube-apiserver", digest('a'), &["v1.19.0"]);

    let mut master = MasterInventory::new();
    master.insert(registry("src.example"), inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]));
    master.insert(registry("dst.example"), inventory_with("kube-apiserver", digest('b'), &["v1.19.0"]));

    let outcome = reconcile(&manifest, &master, &PlannerOptions::default());
    assert_eq!(outcome.edges.len(), 1);
    match &outcome.edges[0].op {
        Op::Move { digest_old } => assert_eq!(*digest_old, digest('b')),
        other => panic!("expected Move, got {:?}", other),
    }
}

#[test]
fn test_reconcile_emits_nothing_when_already_correct() {
    let manifest = manifest_with_source_digest("src.example", "dst.example", "kube-apiserver", digest('a'), &["v1.19.0"]);

    let mut master = MasterInventory::new();
    master.insert(registry("src.example"), inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]));
    master.insert(registry("dst.example"), inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]));

    let outcome = reconcile(&manifest, &master, &PlannerOptions::default());
    assert!(outcome.edges.is_empty());
}

#[test]
fn test_reconcile_drops_edge_missing_from_source_and_warns() {
    let manifest = manifest_with_source_digest("src.example", "dst.example", "kube-apiserver", digest('a'), &["v1.19.0"]);

    let mut master = MasterInventory::new();
    master.insert(registry("src.example"), Inventory::default());
    master.insert(registry("dst.example"), Inventory::default());

    let outcome = reconcile(&manifest, &master, &PlannerOptions::default());
    assert!(outcome.edges.is_empty());
    assert!(outcome.warnings.iter().any(|w| w.contains("not found at source registry")));
}

#[test]
fn test_reconcile_delete_mode_removes_undeclared_destination_tag() {
    let manifest = manifest_with_source_digest("src.example", "dst.example", "kube-apiserver", digest('a'), &["v1.19.0"]);

    let mut master = MasterInventory::new();
    master.insert(registry("src.example"), inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]));
    let mut dst_inv = inventory_with("kube-apiserver", digest('a'), &["v1.19.0"]);
    dst_inv
        .images
        .get_mut(&ImageName::new("kube-apiserver").unwrap())
        .unwrap()
        .dmap
        .insert(digest('c'), tags(&["stale"]));
    master.insert(registry("dst.example"), dst_inv);

    let outcome = reconcile(&manifest, &master, &PlannerOptions { allow_deletions: true });
    assert_eq!(outcome.edges.len(), 1);
    assert_eq!(outcome.edges[0].op, Op::Delete);
    assert_eq!(outcome.edges[0].tag, Tag::new("stale").unwrap());
}

#[test]
fn test_filter_promotion_edges_detects_conflict() {
    let edges = vec![
        PromotionEdge::add(registry("dst.example"), ImageName::new("kube-apiserver").unwrap(), Tag::new("v1.0").unwrap(), digest('a')),
        PromotionEdge::add(registry("dst.example"), ImageName::new("kube-apiserver").unwrap(), Tag::new("v1.0").unwrap(), digest('b')),
    ];
    let master = MasterInventory::new();
    let result = filter_promotion_edges(edges, &master);
    assert!(result.is_err());
}

#[test]
fn test_filter_promotion_edges_drops_already_correct() {
    let edges = vec![PromotionEdge::add(
        registry("dst.example"),
        ImageName::new("kube-apiserver").unwrap(),
        Tag::new("v1.0").unwrap(),
        digest('a'),
    )];
    let mut master = MasterInventory::new();
    master.insert(registry("dst.example"), inventory_with("kube-apiserver", digest('a'), &["v1.0"]));

    let filtered = filter_promotion_edges(edges, &master).unwrap();
    assert!(filtered.is_empty());
}

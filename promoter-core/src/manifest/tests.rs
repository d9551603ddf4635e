use super::*;
use crate::model::{Digest, ImageEntry, ImageName, RegistryContext, Tag};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

fn sample_digest(last: char) -> Digest {
    let hex = std::iter::repeat(last).take(64).collect::<String>();
    Digest::from_str(&format!("sha256:{}", hex)).unwrap()
}

fn sample_manifest() -> Manifest {
    let mut dmap = BTreeMap::new();
    let mut tags = BTreeSet::new();
    tags.insert(Tag::new("v1.0.0").unwrap());
    dmap.insert(sample_digest('a'), tags);

    Manifest::new(
        vec![
            RegistryContext {
                name: "gcr.example/staging".parse().unwrap(),
                service_account_hint: None,
                is_source: true,
            },
            RegistryContext {
                name: "us.example/prod".parse().unwrap(),
                service_account_hint: None,
                is_source: false,
            },
        ],
        vec![ImageEntry {
            name: ImageName::new("kube-apiserver").unwrap(),
            dmap,
        }],
    )
}

#[test]
fn test_valid_manifest_passes_validation() {
    assert!(validate::validate(&sample_manifest()).is_ok());
}

#[test]
fn test_manifest_with_no_source_fails() {
    let mut m = sample_manifest();
    for r in &mut m.registries {
        r.is_source = false;
    }
    assert!(validate::validate(&m).is_err());
}

#[test]
fn test_manifest_with_two_sources_fails() {
    let mut m = sample_manifest();
    m.registries[1].is_source = true;
    assert!(validate::validate(&m).is_err());
}

#[test]
fn test_duplicate_image_names_fail() {
    let mut m = sample_manifest();
    let dup = m.images[0].clone();
    m.images.push(dup);
    assert!(validate::validate(&m).is_err());
}

#[test]
fn test_parse_fat_yaml_roundtrips_to_canonical_render() {
    let yaml = r#"
registries:
  - name: gcr.example/staging
    src: true
  - name: us.example/prod
images:
  - name: kube-apiserver
    dmap:
      "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa": ["v1.0.0"]
"#;
    let manifest = validate::parse_fat("manifest.yaml", yaml).unwrap();
    let rendered = writer::render_to_string(&manifest.images, writer::RenderOptions::default()).unwrap();
    assert!(rendered.contains("name: kube-apiserver"));
    assert!(rendered.contains("v1.0.0"));
}

#[test]
fn test_grow_unions_new_digest_into_existing_image() {
    let mut m = sample_manifest();
    let mut staged_dmap = BTreeMap::new();
    let mut staged_tags = BTreeSet::new();
    staged_tags.insert(Tag::new("v1.1.0").unwrap());
    staged_dmap.insert(sample_digest('b'), staged_tags);
    let staging = vec![ImageEntry {
        name: ImageName::new("kube-apiserver").unwrap(),
        dmap: staged_dmap,
    }];

    let count = grow::grow(&mut m.images, &staging, &grow::GrowFilter::default()).unwrap();
    assert_eq!(count, 1);
    assert_eq!(m.images[0].dmap.len(), 2);
}

#[test]
fn test_grow_fails_on_empty_filtered_staging() {
    let mut m = sample_manifest();
    let staging = vec![];
    let filter = grow::GrowFilter::default();
    assert!(grow::grow(&mut m.images, &staging, &filter).is_err());
}

#[test]
fn test_diff_detects_added_removed_and_retagged() {
    let mut before = BTreeMap::new();
    let mut before_tags_a = BTreeSet::new();
    before_tags_a.insert(Tag::new("v1").unwrap());
    before_tags_a.insert(Tag::new("v2").unwrap());
    before.insert(sample_digest('a'), before_tags_a);

    let mut after = BTreeMap::new();
    let mut after_tags_a = BTreeSet::new();
    after_tags_a.insert(Tag::new("v1").unwrap());
    after.insert(sample_digest('a'), after_tags_a);
    let mut after_tags_b = BTreeSet::new();
    after_tags_b.insert(Tag::new("v2").unwrap());
    after_tags_b.insert(Tag::new("v3").unwrap());
    after.insert(sample_digest('b'), after_tags_b);

    let d = diff::diff(&before, &after);
    assert!(d.added.contains(&Tag::new("v3").unwrap()));
    assert!(!d.removed.is_empty() || !d.retagged.is_empty());
    assert!(d.retagged.iter().any(|r| r.tag.as_str() == "v2"));
}

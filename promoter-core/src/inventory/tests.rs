use super::model::{Inventory, ParentLink, RegInvImage};
use crate::model::{Digest, ImageName, Tag};
use std::str::FromStr;

fn digest(last: char) -> Digest {
    let hex = std::iter::repeat(last).take(64).collect::<String>();
    Digest::from_str(&format!("sha256:{}", hex)).unwrap()
}

#[test]
fn test_digest_for_resolves_tag_within_registry() {
    let mut inventory = Inventory::default();
    let mut image = RegInvImage::new(ImageName::new("kube-apiserver").unwrap());
    let mut tags = std::collections::BTreeSet::new();
    tags.insert(Tag::new("v1.19.0").unwrap());
    image.dmap.insert(digest('a'), tags);
    inventory.images.insert(image.name.clone(), image);

    let found = inventory.digest_for(&ImageName::new("kube-apiserver").unwrap(), &Tag::new("v1.19.0").unwrap());
    assert_eq!(found, Some(&digest('a')));
}

#[test]
fn test_invalid_parents_detects_cross_image_child() {
    let mut inventory = Inventory::default();

    let mut image_a = RegInvImage::new(ImageName::new("kube-apiserver").unwrap());
    image_a.dmap.insert(digest('b'), std::collections::BTreeSet::new());
    inventory.images.insert(image_a.name.clone(), image_a);

    let mut image_b = RegInvImage::new(ImageName::new("kube-scheduler").unwrap());
    image_b.dmap.insert(digest('b'), std::collections::BTreeSet::new()); // same digest under a different image
    inventory.images.insert(image_b.name.clone(), image_b);

    inventory.parent_digest.insert(
        digest('b'),
        ParentLink {
            parent: digest('a'),
            owner_image: ImageName::new("kube-apiserver").unwrap(),
        },
    );

    let invalid = inventory.invalid_parents();
    assert_eq!(invalid, vec![digest('a')]);
}

#[test]
fn test_invalid_parents_empty_when_no_cross_image_collision() {
    let mut inventory = Inventory::default();
    let mut image_a = RegInvImage::new(ImageName::new("kube-apiserver").unwrap());
    image_a.dmap.insert(digest('b'), std::collections::BTreeSet::new());
    inventory.images.insert(image_a.name.clone(), image_a);

    inventory.parent_digest.insert(
        digest('c'),
        ParentLink {
            parent: digest('a'),
            owner_image: ImageName::new("kube-apiserver").unwrap(),
        },
    );

    assert!(inventory.invalid_parents().is_empty());
}

use super::*;

#[test]
fn test_tag_rejects_latest() {
    assert!(Tag::new("latest").is_err());
}

#[test]
fn test_tag_rejects_whitespace() {
    assert!(Tag::new("v1.0 beta").is_err());
}

#[test]
fn test_tag_rejects_empty() {
    assert!(Tag::new("").is_err());
}

#[test]
fn test_tag_accepts_ordinary_value() {
    assert!(Tag::new("v1.19.0").is_ok());
}

#[test]
fn test_registry_rejects_whitespace() {
    assert!(Registry::new("us example/prod").is_err());
}

#[test]
fn test_image_name_rejects_empty() {
    assert!(ImageName::new("").is_err());
}

#[test]
fn test_digest_for_tag_finds_owner() {
    let mut dmap: DMap = DMap::new();
    let d = "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc"
        .parse::<Digest>()
        .unwrap();
    let tag = Tag::new("v1.0").unwrap();
    dmap.entry(d.clone()).or_default().insert(tag.clone());

    assert_eq!(digest_for_tag(&dmap, &tag), Some(&d));
    assert_eq!(digest_for_tag(&dmap, &Tag::new("v2.0").unwrap()), None);
}

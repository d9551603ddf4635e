use super::*;

#[test]
fn test_valid_sha256_digest_parses() {
    let s = "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";
    let digest = Digest::from_str(s).unwrap();
    assert_eq!(digest.algorithm(), "sha256");
    assert_eq!(digest.to_string(), s);
}

#[test]
fn test_wrong_length_hex_is_rejected() {
    let s = "sha256:abc123";
    assert!(Digest::from_str(s).is_err());
}

#[test]
fn test_non_hex_characters_rejected() {
    let s = "sha256:zz73b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";
    assert!(Digest::from_str(s).is_err());
}

#[test]
fn test_unregistered_algorithm_rejected() {
    let s = "sha512:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";
    assert!(Digest::from_str(s).is_err());
}

#[test]
fn test_registering_new_algorithm_allows_it() {
    register_algorithm("sha512-test-only", 128);
    let hex = "a".repeat(128);
    let s = format!("sha512-test-only:{}", hex);
    assert!(Digest::from_str(&s).is_ok());
}

#[test]
fn test_ordering_is_by_algorithm_then_hex() {
    let a = Digest::from_str("sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        .unwrap();
    let b = Digest::from_str("sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
        .unwrap();
    assert!(a < b);
}

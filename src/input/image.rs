//! Container image reference syntax check.

use once_cell::sync::Lazy;
use regex::Regex;

// [host[:port]/]component(/component)*[:tag][@sha256:digest]
static IMAGE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:[A-Za-z0-9.-]+(?::[0-9]+)?/)?",
        r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*",
        r"(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*",
        r"(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?",
        r"(?:@sha256:[a-f0-9]{64})?$",
    ))
    .expect("image reference regex is valid")
});

/// Check whether `reference` is a syntactically valid container image reference.
pub fn is_valid_image_reference(reference: &str) -> bool {
    reference.len() <= 4096 && IMAGE_REF_RE.is_match(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_references() {
        assert!(is_valid_image_reference("repo/img:latest"));
        assert!(is_valid_image_reference("nginx"));
        assert!(is_valid_image_reference(
            "europe-west1-docker.pkg.dev/demo/my-cloudrun-repo/my-app:latest"
        ));
        assert!(is_valid_image_reference("localhost:5000/team/app_v2:1.0.3"));
        assert!(is_valid_image_reference(&format!(
            "gcr.io/demo/app@sha256:{}",
            "a".repeat(64)
        )));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_image_reference("Bad Image"));
        assert!(!is_valid_image_reference("repo/img:"));
        assert!(!is_valid_image_reference("repo//img"));
        assert!(!is_valid_image_reference("repo/-img"));
        assert!(!is_valid_image_reference("repo/img@sha256:short"));
    }
}

//! Asset-link rewriting for documentation sources.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Token that documentation authors use in place of the public base address.
pub const PLACEHOLDER: &str = "{PLACEHOLDER_APP_RESOURCES_BASE_URI}";

/// Rewrites asset references in documentation sources to absolute URLs.
///
/// Two kinds of reference are rewritten, in any number and any mix:
/// - the [`PLACEHOLDER`] token becomes the external address (whatever path
///   follows the token is kept);
/// - `./<assets>/…` and `<assets>/…` become
///   `<external address>/<bucket>/<id>/<assets>/…`.
///
/// A bare `<assets>/` only counts at the start of a reference, so the same
/// segment inside some other URL is left alone.
///
/// ```
/// use speccy_spec::LinkRewriter;
///
/// let links = LinkRewriter::new("https://test.ninja/", "test", "assets").unwrap();
/// assert_eq!(
///     links.rewrite("valid", r#"<img src="./assets/a.png"> <a href="https://x.io/assets/b">"#),
///     r#"<img src="https://test.ninja/test/valid/assets/a.png"> <a href="https://x.io/assets/b">"#,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    external_address: String,
    bucket: String,
    assets_folder: String,
    pattern: Regex,
}

impl LinkRewriter {
    pub fn new(external_address: &str, bucket: &str, assets_folder: &str) -> Result<Self> {
        if assets_folder.is_empty() || assets_folder.contains('/') {
            exn::bail!(ErrorKind::Config(format!("assets folder must be a single path segment: {assets_folder:?}")));
        }
        // The character before a relative reference is captured (and put back)
        // because there is no look-behind.
        let pattern = format!(
            r"{}|(^|[^\w./-])(?:\./)?{}/",
            regex::escape(PLACEHOLDER),
            regex::escape(assets_folder)
        );
        let pattern = Regex::new(&pattern).or_raise(|| ErrorKind::Config("assets folder pattern".to_string()))?;
        Ok(Self {
            external_address: external_address.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            assets_folder: assets_folder.to_string(),
            pattern,
        })
    }

    /// Rewrite every asset reference in `source`, which belongs to `id`.
    ///
    /// Borrows `source` unchanged when there is nothing to rewrite.
    pub fn rewrite<'a>(&self, id: &str, source: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(source, |caps: &Captures<'_>| match caps.get(1) {
            None => self.external_address.clone(),
            Some(prefix) => format!(
                "{}{}/{}/{id}/{}/",
                prefix.as_str(),
                self.external_address,
                self.bucket,
                self.assets_folder
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn links() -> LinkRewriter {
        LinkRewriter::new("https://test.ninja", "test", "assets").unwrap()
    }

    #[rstest]
    #[case(
        r#"<img src="{PLACEHOLDER_APP_RESOURCES_BASE_URI}/service-class/example-docs/assets/image.jpg" />"#,
        r#"<img src="https://test.ninja/service-class/example-docs/assets/image.jpg" />"#
    )]
    #[case(r#"<img src="./assets/image.jpg" />"#, r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#)]
    #[case(r#"<img src="assets/image.jpg" />"#, r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#)]
    #[case("assets/image.jpg", "https://test.ninja/test/valid/assets/image.jpg")]
    #[case("![diagram](./assets/flow.svg)", "![diagram](https://test.ninja/test/valid/assets/flow.svg)")]
    #[case(
        "line one\n./assets/a.png\nassets/b.png",
        "line one\nhttps://test.ninja/test/valid/assets/a.png\nhttps://test.ninja/test/valid/assets/b.png"
    )]
    fn test_rewrite(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(links().rewrite("valid", source), expected);
    }

    #[test]
    fn test_rewrite_mixed_multiple() {
        let source = concat!(
            r#"<img src="assets/image.jpg" /><img src="assets/image.jpg" />"#,
            r#"<img src="./assets/image.jpg" /><img src="./assets/image.jpg" />"#,
            r#"<img src="{PLACEHOLDER_APP_RESOURCES_BASE_URI}/service-class/example-docs/assets/image.jpg" />"#,
            r#"<img src="{PLACEHOLDER_APP_RESOURCES_BASE_URI}/service-class/example-docs/assets/image.jpg" />"#,
        );
        let expected = concat!(
            r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#,
            r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#,
            r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#,
            r#"<img src="https://test.ninja/test/valid/assets/image.jpg" />"#,
            r#"<img src="https://test.ninja/service-class/example-docs/assets/image.jpg" />"#,
            r#"<img src="https://test.ninja/service-class/example-docs/assets/image.jpg" />"#,
        );
        assert_eq!(links().rewrite("valid", source), expected);
    }

    #[rstest]
    #[case("No images here.")]
    #[case(r#"<a href="https://example.com/assets/logo.png">"#)]
    #[case(r#"<img src="../assets/image.jpg" />"#)]
    #[case(r#"<img src="my-assets/image.jpg" />"#)]
    #[case("assets.jpg")]
    fn test_unrelated_text_is_untouched(#[case] source: &str) {
        assert!(matches!(links().rewrite("valid", source), Cow::Borrowed(_)));
    }

    #[test]
    fn test_trailing_slash_and_special_folder() {
        let links = LinkRewriter::new("https://test.ninja/", "test", "static.files").unwrap();
        assert_eq!(links.rewrite("x", "static.files/a.png"), "https://test.ninja/test/x/static.files/a.png");
        // `.` is literal, not "any character".
        assert_eq!(links.rewrite("x", "staticXfiles/a.png"), "staticXfiles/a.png");
    }

    #[rstest]
    #[case("")]
    #[case("nested/assets")]
    fn test_invalid_folder(#[case] folder: &str) {
        let err = LinkRewriter::new("https://test.ninja", "test", folder).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}

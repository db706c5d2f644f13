// ─── Release Model ───
// Records returned by the release registry's "latest release" endpoint.

use serde::Deserialize;

/// A published release. `tag` is opaque: two releases are the same
/// version only when their tags are byte-for-byte equal.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// `sha256:<hex>` when the registry publishes one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl Release {
    /// Assets to fetch: all of them, or only those named in `filter`,
    /// keeping the release's own order.
    pub fn select_assets<'a>(&'a self, filter: Option<&[String]>) -> Vec<&'a Asset> {
        match filter {
            None => self.assets.iter().collect(),
            Some(names) => self
                .assets
                .iter()
                .filter(|asset| names.iter().any(|n| n == &asset.name))
                .collect(),
        }
    }
}

impl Asset {
    /// Expected SHA-256 in lowercase hex, if the digest uses that algorithm.
    pub fn expected_sha256(&self) -> Option<String> {
        let digest = self.digest.as_deref()?;
        let (algo, value) = digest.split_once(':')?;
        if algo.eq_ignore_ascii_case("sha256") && !value.is_empty() {
            Some(value.to_ascii_lowercase())
        } else {
            None
        }
    }
}

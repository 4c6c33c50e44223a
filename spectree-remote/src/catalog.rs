//! SRPM directory listings as the remote catalog
//!
//! The catalog for a release is the union of the source package listings
//! of every configured media. Each listing is an `http(s)://` autoindex
//! page, an `ftp://` directory or a `file://` directory on a local mirror.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use spectree_core::{Catalog, CatalogSource, DistTag, Evr, FetchError, RemoteVersionRecord};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result};

pub const DEFAULT_SRPM_SOURCE: &str =
    "https://distrib-coffee.ipsl.jussieu.fr/pub/linux/Mageia/distrib/{version}/SRPMS/{media}/{section}/";

pub const DEFAULT_MEDIAS: &[&str] = &["tainted", "nonfree", "core"];

pub const DEFAULT_SECTION: &str = "release";

/// Listings of large medias are slow to produce on some mirrors.
const LISTING_TIMEOUT: Duration = Duration::from_secs(120);

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid href regex"));

pub struct SrpmIndexCatalog {
    client: reqwest::Client,
    template: String,
    distro_version: String,
    medias: Vec<String>,
    section: String,
    dist: DistTag,
}

impl SrpmIndexCatalog {
    pub fn new(
        client: reqwest::Client,
        template: impl Into<String>,
        distro_version: impl Into<String>,
        dist: DistTag,
    ) -> Self {
        Self {
            client,
            template: template.into(),
            distro_version: distro_version.into(),
            medias: DEFAULT_MEDIAS.iter().map(|m| m.to_string()).collect(),
            section: DEFAULT_SECTION.to_string(),
            dist,
        }
    }

    pub fn with_medias(mut self, medias: Vec<String>) -> Self {
        self.medias = medias;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Listing locations, one per media.
    pub fn locations(&self) -> Vec<String> {
        self.medias
            .iter()
            .map(|media| {
                self.template
                    .replace("{version}", &self.distro_version)
                    .replace("{media}", media)
                    .replace("{section}", &self.section)
            })
            .collect()
    }

    async fn list_directory(&self, location: &str) -> Result<Vec<String>> {
        let url = Url::parse(location)?;
        match url.scheme() {
            "http" | "https" => {
                let body =
                    crate::http::fetch_text(&self.client, location, Some(LISTING_TIMEOUT)).await?;
                Ok(parse_listing(&body))
            }
            "ftp" => crate::ftp::list_ftp_directory(&url, LISTING_TIMEOUT).await,
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::Unsupported(location.to_string()))?;
                let mut entries = tokio::fs::read_dir(&path).await?;
                let mut names = Vec::new();
                while let Some(entry) = entries.next_entry().await? {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
                names.sort();
                Ok(names)
            }
            _ => Err(Error::Unsupported(location.to_string())),
        }
    }
}

#[async_trait]
impl CatalogSource for SrpmIndexCatalog {
    async fn fetch_catalog(&self) -> std::result::Result<Catalog, FetchError> {
        let mut records = Vec::new();
        for location in self.locations() {
            info!("Fetching SRPM listing {}", location);
            let names = self
                .list_directory(&location)
                .await
                .map_err(|e| e.into_fetch_error(&location))?;
            let found = records_from_listing(&names, &self.dist);
            if found.is_empty() {
                return Err(FetchError::EmptyListing { url: location });
            }
            debug!("{} source packages in {}", found.len(), location);
            records.extend(found);
        }

        let catalog = Catalog::from_records(records);
        if catalog.is_empty() {
            return Err(FetchError::EmptyCatalog);
        }
        info!("Remote catalog holds {} packages", catalog.len());
        Ok(catalog)
    }
}

/// Extract file names from an autoindex page.
pub fn parse_listing(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for caps in HREF_RE.captures_iter(html) {
        let href = caps[1].replace("&amp;", "&");
        if href.starts_with('?') || href.starts_with('#') || href.ends_with('/') {
            continue;
        }
        let Some(last) = href.rsplit('/').next() else {
            continue;
        };
        let name = match urlencoding::decode(last) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => last.to_string(),
        };
        if !name.is_empty() && seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Turn `.src.rpm` file names into catalog records. Other files are ignored.
pub fn records_from_listing(names: &[String], dist: &DistTag) -> Vec<RemoteVersionRecord> {
    let mut records = Vec::new();
    for file_name in names.iter().filter(|n| n.ends_with(".src.rpm")) {
        let Some((name, version, release)) = dist.split_srpm_name(file_name) else {
            debug!("Skipping unrecognised package file {}", file_name);
            continue;
        };
        match Evr::new(None, version, dist.canonical_release(release)) {
            Ok(evr) => records.push(RemoteVersionRecord::without_epoch(name, evr)),
            Err(e) => warn!("Skipping {}: {}", file_name, e),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dist() -> DistTag {
        DistTag::new("mga10").unwrap()
    }

    #[test]
    fn test_parse_apache_listing() {
        let html = r#"<html><body><h1>Index of /SRPMS/core/release</h1>
<table><tr><th><a href="?C=N;O=D">Name</a></th></tr>
<tr><td><a href="/pub/linux/Mageia/distrib/cauldron/SRPMS/core/">Parent Directory</a></td></tr>
<tr><td><a href="foo-1.2-3.mga10.src.rpm">foo-1.2-3.mga10.src.rpm</a></td></tr>
<tr><td><a href="lib%2B%2B-2.0-1.mga10.src.rpm">lib++-2.0-1.mga10.src.rpm</a></td></tr>
<tr><td><a href="foo-1.2-3.mga10.src.rpm">again</a></td></tr>
<tr><td><a href="debug/">debug/</a></td></tr>
</table></body></html>"#;
        assert_eq!(
            parse_listing(html),
            vec!["foo-1.2-3.mga10.src.rpm", "lib++-2.0-1.mga10.src.rpm"]
        );
    }

    #[test]
    fn test_parse_nginx_listing() {
        let html = "<html><head><title>Index of /release/</title></head><body>\n\
<pre><a href=\"../\">../</a>\n\
<a href=\"bar-0.9-1.mga10.nonfree.src.rpm\">bar-0.9-1.mga10.nonfree.src.rpm</a>  01-May-2024 10:00  12345\n\
<a href=\"media_info/\">media_info/</a>\n\
</pre></body></html>";
        assert_eq!(parse_listing(html), vec!["bar-0.9-1.mga10.nonfree.src.rpm"]);
    }

    #[test]
    fn test_records_from_listing() {
        let names: Vec<String> = [
            "foo-1.2-3.mga10.src.rpm",
            "bar-0.9-1.mga10.nonfree.src.rpm",
            "perl-Foo-Bar-0.01-2.mga10.src.rpm",
            "README",
            "broken.src.rpm",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let records = records_from_listing(&names, &dist());
        let found: Vec<(String, String)> = records
            .iter()
            .map(|r| (r.package_name.clone(), r.evr.to_string()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("foo".to_string(), "1.2-3.mga10".to_string()),
                ("bar".to_string(), "0.9-1.mga10".to_string()),
                ("perl-Foo-Bar".to_string(), "0.01-2.mga10".to_string()),
            ]
        );
        // file names carry no epoch
        assert!(records.iter().all(|r| !r.epoch_known));
    }

    #[test]
    fn test_locations() {
        let client = reqwest::Client::new();
        let catalog = SrpmIndexCatalog::new(client, DEFAULT_SRPM_SOURCE, "cauldron", dist())
            .with_medias(vec!["core".into()])
            .with_section("updates");
        assert_eq!(
            catalog.locations(),
            vec!["https://distrib-coffee.ipsl.jussieu.fr/pub/linux/Mageia/distrib/cauldron/SRPMS/core/updates/"]
        );
    }

    #[tokio::test]
    async fn test_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        for (media, files) in [
            ("core", vec!["foo-1.2-3.mga10.src.rpm", "foo-1.2-4.mga10.src.rpm"]),
            ("nonfree", vec!["bar-0.9-1.mga10.nonfree.src.rpm"]),
        ] {
            let path = dir.path().join(media).join("release");
            fs::create_dir_all(&path).unwrap();
            for file in files {
                fs::write(path.join(file), b"").unwrap();
            }
        }

        let template = format!(
            "{}/{{media}}/{{section}}/",
            Url::from_directory_path(dir.path()).unwrap().as_str().trim_end_matches('/')
        );
        let source = SrpmIndexCatalog::new(reqwest::Client::new(), template, "cauldron", dist())
            .with_medias(vec!["core".into(), "nonfree".into()]);
        let catalog = source.fetch_catalog().await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("foo").unwrap().evr.to_string(), "1.2-4.mga10");
        assert_eq!(catalog.get("bar").unwrap().evr.to_string(), "0.9-1.mga10");
    }

    #[tokio::test]
    async fn test_ftp_catalog() {
        let addr = crate::ftp::tests::serve(crate::ftp::tests::FakeSite {
            dirs: vec!["/SRPMS/core/release/".to_string()],
            listing: vec![
                "foo-1.2-3.mga10.src.rpm".to_string(),
                "bar-0.9-1.mga10.src.rpm".to_string(),
                "media_info".to_string(),
            ],
            ..Default::default()
        });
        let template = format!("ftp://{}/SRPMS/{{media}}/{{section}}/", addr);
        let source = SrpmIndexCatalog::new(reqwest::Client::new(), template, "cauldron", dist())
            .with_medias(vec!["core".into()]);
        let catalog = source.fetch_catalog().await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("foo").unwrap().evr.to_string(), "1.2-3.mga10");
        assert!(!catalog.get("bar").unwrap().epoch_known);
    }

    #[tokio::test]
    async fn test_empty_media_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("core/release")).unwrap();
        fs::write(dir.path().join("core/release/README"), b"").unwrap();

        let template = format!(
            "{}{{media}}/{{section}}/",
            Url::from_directory_path(dir.path()).unwrap()
        );
        let source = SrpmIndexCatalog::new(reqwest::Client::new(), template, "cauldron", dist())
            .with_medias(vec!["core".into()]);
        let err = source.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyListing { .. }));
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = format!(
            "{}{{media}}/{{section}}/",
            Url::from_directory_path(dir.path()).unwrap()
        );
        let source = SrpmIndexCatalog::new(reqwest::Client::new(), template, "cauldron", dist())
            .with_medias(vec!["core".into()]);
        let err = source.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let source = SrpmIndexCatalog::new(
            reqwest::Client::new(),
            "rsync://mirror.example.org/{media}/",
            "cauldron",
            dist(),
        );
        let err = source.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }
}

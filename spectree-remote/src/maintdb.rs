use spectree_core::Maintainers;
use tracing::info;

use crate::Result;

pub const MAINTDB_URL: &str = "https://pkgsubmit.mageia.org/data/maintdb.txt";

/// Download the package to maintainer table.
pub async fn fetch_maintainers(client: &reqwest::Client, location: &str) -> Result<Maintainers> {
    let text = crate::http::fetch_text(client, location, None).await?;
    let maintainers = Maintainers::parse(&text);
    info!("Loaded {} maintainer assignments", maintainers.len());
    Ok(maintainers)
}

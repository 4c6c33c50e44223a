//! spectree-remote: network backed sources for spectree
//!
//! - The SRPM listing catalog
//! - The maintainer database
//! - HTTP(S) and FTP URL probers

pub mod catalog;
pub mod error;
pub mod ftp;
pub mod http;
pub mod maintdb;
pub mod probe;

pub use catalog::SrpmIndexCatalog;
pub use error::{Error, Result};
pub use http::build_client;
pub use maintdb::fetch_maintainers;
pub use ftp::FtpProber;
pub use probe::{HttpProber, NetworkProber};

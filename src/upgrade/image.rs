//! RouterOS package provisioning.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::debug;

use crate::error::RosupError;
use crate::output::{create_transfer_bar, print_error};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Package file name for an architecture and version.
pub fn artifact_name(architecture: &str, version: &str) -> String {
    format!("routeros-{}-{}.npk", architecture, version)
}

/// `<base>/<version>/<file>`, joined with single slashes.
pub fn download_url(base_url: &str, version: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        version.trim_matches('/'),
        file_name
    )
}

/// Downloads a URL to a local file.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), RosupError>;
}

/// Blocking HTTP downloader.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    /// Stream the body into `<dest>.part`, renaming it into place once complete.
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), RosupError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| RosupError::download(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RosupError::download(url, status));
        }

        let length = response.content_length();
        save(&mut response, length, dest)
            .map_err(|e| RosupError::download(url, e))
    }
}

/// Write `body` to `<dest>.part` and rename it into place. The partial file
/// is removed when the body can't be read to the end.
fn save(body: &mut impl Read, length: Option<u64>, dest: &Path) -> io::Result<()> {
    let part = part_path(dest);

    if let Err(e) = write_part(body, length, &part, dest) {
        if let Err(cleanup) = fs::remove_file(&part) {
            debug!("Could not remove {}: {}", part.display(), cleanup);
        }
        return Err(e);
    }

    fs::rename(&part, dest)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

fn write_part(
    body: &mut impl Read,
    length: Option<u64>,
    part: &Path,
    dest: &Path,
) -> io::Result<()> {
    let pb = create_transfer_bar(length.unwrap_or(0));
    if let Some(name) = dest.file_name() {
        pb.set_message(name.to_string_lossy().to_string());
    }

    let mut writer = pb.wrap_write(BufWriter::new(File::create(part)?));
    io::copy(body, &mut writer)?;
    writer.flush()?;
    pb.finish_and_clear();

    Ok(())
}

/// Make sure the package exists in `image_dir`, downloading it if allowed.
///
/// A failed download is reported but not fatal: the result is decided by
/// whether the file exists afterwards.
pub fn ensure(
    fetcher: &dyn Fetcher,
    image_dir: &Path,
    artifact: &str,
    version: &str,
    base_url: &str,
    download: bool,
) -> Result<PathBuf, RosupError> {
    let path = image_dir.join(artifact);

    if !path.is_file() && download {
        let url = download_url(base_url, version, artifact);
        println!("Downloading RouterOS image file {}", url);

        if let Err(e) = fetcher.fetch(&url, &path) {
            debug!("Download of {} failed: {:?}", artifact, e);
            print_error(&e.to_string());
        }
    }

    if path.is_file() {
        Ok(path)
    } else {
        Err(RosupError::ArtifactMissing(path.display().to_string()))
    }
}

//! Kubo RPC client backing the production store session.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Url};
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::StoreSession;
use crate::error::{IpfsError, IpfsResult};
use crate::{api_base_url, ensure_success};

const DIRECTORY_MIME: &str = "application/x-directory";
const FILE_MIME: &str = "application/octet-stream";
const SPOOL_SUFFIX: &str = ".tar.partial";

/// Multipart file names are query-escaped; Kubo unescapes them back into paths.
const FILE_NAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// [`StoreSession`] speaking the Kubo `/api/v0` RPC protocol.
#[derive(Debug, Clone)]
pub struct KuboSession {
    client: Client,
    api_base: Url,
    timeout: Option<Duration>,
}

impl KuboSession {
    /// Build a session for the API listening at `gateway` (`host:port` or a URL).
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot form a URL or the HTTP client
    /// cannot be constructed.
    pub fn new(gateway: &str) -> IpfsResult<Self> {
        let api_base = api_base_url(gateway)?;
        let client = Client::builder()
            .build()
            .map_err(|source| IpfsError::Client { source })?;
        Ok(Self {
            client,
            api_base,
            timeout: None,
        })
    }

    fn endpoint(&self, path: &str) -> IpfsResult<Url> {
        self.api_base
            .join(path)
            .map_err(|source| IpfsError::InvalidGateway {
                gateway: self.api_base.to_string(),
                source,
            })
    }

    fn post(&self, url: Url) -> RequestBuilder {
        let request = self.client.post(url);
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

#[async_trait]
impl StoreSession for KuboSession {
    async fn add_directory(&mut self, path: &str) -> IpfsResult<String> {
        let root = PathBuf::from(path);
        let entries = collect_upload_entries(root.clone()).await?;
        let mut form = Form::new();
        for entry in entries {
            form = form.part("file", entry.into_part().await?);
        }

        let mut url = self.endpoint("add")?;
        url.query_pairs_mut()
            .append_pair("progress", "false")
            .append_pair("pin", "true");
        let response = self
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|source| IpfsError::http("add", url.as_str(), source))?;
        let body = ensure_success("add", &url, response)
            .await?
            .text()
            .await
            .map_err(|source| IpfsError::http("add", url.as_str(), source))?;
        parse_add_response(&body, &root)
    }

    async fn fetch(&mut self, content_id: &str, local_path: &Path) -> IpfsResult<()> {
        let mut url = self.endpoint("get")?;
        url.query_pairs_mut().append_pair("arg", content_id);
        let response = self
            .post(url.clone())
            .send()
            .await
            .map_err(|source| IpfsError::http("get", url.as_str(), source))?;
        let mut response = ensure_success("get", &url, response).await?;

        if let Some(parent) = local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| IpfsError::io("get.create_parent", parent, source))?;
        }

        let spool = spool_path(local_path);
        let mut file = File::create(&spool)
            .await
            .map_err(|source| IpfsError::io("get.spool_create", &spool, source))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| IpfsError::http("get", url.as_str(), source))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|source| IpfsError::io("get.spool_write", &spool, source))?;
        }
        file.flush()
            .await
            .map_err(|source| IpfsError::io("get.spool_write", &spool, source))?;
        drop(file);

        let archive = spool.clone();
        let target = local_path.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&archive, &target))
            .await
            .map_err(|source| IpfsError::Join {
                operation: "get.unpack",
                source,
            })?;
        if let Err(err) = fs::remove_file(&spool).await {
            warn!(path = %spool.display(), error = %err, "failed to remove fetch spool");
        }
        unpacked?;

        debug!(content_id, path = %local_path.display(), "unpacked fetched content");
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

#[derive(Debug)]
enum UploadKind {
    Directory,
    File { len: u64 },
}

#[derive(Debug)]
struct UploadEntry {
    name: String,
    path: PathBuf,
    kind: UploadKind,
}

impl UploadEntry {
    async fn into_part(self) -> IpfsResult<Part> {
        let file_name = utf8_percent_encode(&self.name, FILE_NAME_ESCAPE).to_string();
        let part = match self.kind {
            UploadKind::Directory => Part::bytes(Vec::new())
                .file_name(file_name)
                .mime_str(DIRECTORY_MIME),
            UploadKind::File { len } => {
                let file = File::open(&self.path)
                    .await
                    .map_err(|source| IpfsError::io("add.open", &self.path, source))?;
                Part::stream_with_length(Body::from(file), len)
                    .file_name(file_name)
                    .mime_str(FILE_MIME)
            }
        };
        part.map_err(|source| IpfsError::Client { source })
    }
}

#[derive(Debug, Deserialize)]
struct AddEntry {
    #[serde(rename = "Hash", default)]
    hash: Option<String>,
}

async fn collect_upload_entries(root: PathBuf) -> IpfsResult<Vec<UploadEntry>> {
    tokio::task::spawn_blocking(move || walk_upload_entries(&root))
        .await
        .map_err(|source| IpfsError::Join {
            operation: "add.walk",
            source,
        })?
}

fn walk_upload_entries(root: &Path) -> IpfsResult<Vec<UploadEntry>> {
    let base = root
        .file_name()
        .map_or_else(|| "content".to_string(), |name| name.to_string_lossy().into_owned());
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| IpfsError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            UploadKind::Directory
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|source| IpfsError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            UploadKind::File {
                len: metadata.len(),
            }
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular upload entry");
            continue;
        };

        let mut name = base.clone();
        if let Ok(relative) = entry.path().strip_prefix(root) {
            for component in relative.components() {
                if let Component::Normal(part) = component {
                    name.push('/');
                    name.push_str(&part.to_string_lossy());
                }
            }
        }
        entries.push(UploadEntry {
            name,
            path: entry.path().to_path_buf(),
            kind,
        });
    }
    Ok(entries)
}

fn parse_add_response(body: &str, root: &Path) -> IpfsResult<String> {
    let mut root_hash = None;
    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let entry: AddEntry = serde_json::from_str(line).map_err(|source| IpfsError::Decode {
            operation: "add",
            source,
        })?;
        if let Some(hash) = entry.hash {
            root_hash = Some(hash);
        }
    }
    root_hash.ok_or_else(|| IpfsError::MissingHash {
        path: root.to_path_buf(),
    })
}

fn spool_path(local_path: &Path) -> PathBuf {
    let mut spool = local_path.as_os_str().to_owned();
    spool.push(SPOOL_SUFFIX);
    PathBuf::from(spool)
}

fn unpack_archive(archive: &Path, target: &Path) -> IpfsResult<()> {
    let file = std::fs::File::open(archive)
        .map_err(|source| IpfsError::io("get.unpack_open", archive, source))?;
    let mut tar = tar::Archive::new(file);
    let entries = tar
        .entries()
        .map_err(|source| IpfsError::io("get.unpack_read", archive, source))?;
    for entry in entries {
        let mut entry = entry.map_err(|source| IpfsError::io("get.unpack_read", archive, source))?;
        let entry_path = entry
            .path()
            .map_err(|source| IpfsError::io("get.unpack_read", archive, source))?
            .into_owned();
        let destination = entry_destination(&entry_path, target)?;
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|source| IpfsError::io("get.unpack_dir", parent, source))?;
        }
        entry
            .unpack(&destination)
            .map_err(|source| IpfsError::io("get.unpack_entry", &destination, source))?;
    }
    Ok(())
}

/// Map an archive entry onto the local output path: the leading component is
/// the fetched content id and is replaced by `target`.
fn entry_destination(entry: &Path, target: &Path) -> IpfsResult<PathBuf> {
    let mut components = entry.components();
    components.next();
    let mut destination = target.to_path_buf();
    for component in components {
        match component {
            Component::Normal(part) => destination.push(part),
            Component::CurDir => {}
            _ => {
                return Err(IpfsError::UnsafeEntry {
                    entry: entry.to_path_buf(),
                });
            }
        }
    }
    Ok(destination)
}

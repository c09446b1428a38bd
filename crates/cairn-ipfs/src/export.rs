//! Streams `dag/export` CAR archives from the gateway to local files.

use std::io::{self, ErrorKind};
use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{IpfsError, IpfsResult};
use crate::{api_base_url, ensure_success};

/// Exports stored content as an archive file.
#[async_trait]
pub trait DagExporter: Send + Sync {
    /// Replace `output_path` with the archive of `content_id`.
    async fn export(&self, content_id: &str, output_path: &Path) -> IpfsResult<()>;
}

/// [`DagExporter`] backed by the Kubo `dag/export` endpoint.
#[derive(Debug, Clone)]
pub struct ArchiveExporter {
    client: Client,
    endpoint: Url,
}

impl ArchiveExporter {
    /// Build an exporter for the API listening at `gateway`.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot form a URL or the HTTP client
    /// cannot be constructed.
    pub fn new(gateway: &str) -> IpfsResult<Self> {
        let endpoint = api_base_url(gateway)?
            .join("dag/export")
            .map_err(|source| IpfsError::InvalidGateway {
                gateway: gateway.to_string(),
                source,
            })?;
        let client = Client::builder()
            .build()
            .map_err(|source| IpfsError::Client { source })?;
        Ok(Self { client, endpoint })
    }

    async fn open_fresh(output_path: &Path) -> IpfsResult<File> {
        match fs::remove_file(output_path).await {
            Ok(()) => debug!(path = %output_path.display(), "removed previous export"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(IpfsError::io("export.remove", output_path, err)),
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .await
            .map_err(|source| IpfsError::io("export.create", output_path, source))
    }
}

#[async_trait]
impl DagExporter for ArchiveExporter {
    async fn export(&self, content_id: &str, output_path: &Path) -> IpfsResult<()> {
        let mut file = Self::open_fresh(output_path).await?;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("arg", content_id);
        let response = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|source| IpfsError::http("dag_export", url.as_str(), source))?;
        let mut response = ensure_success("dag_export", &url, response).await?;

        let written = copy_lines(&mut response, &mut file, content_id)
            .await
            .map_err(|source| IpfsError::io("export.write", output_path, source))?;

        debug!(content_id, path = %output_path.display(), bytes = written, "export complete");
        Ok(())
    }
}

/// Append the response body to `sink` one `\n`-terminated piece at a time.
///
/// A transport error ends the body like a clean EOF; the gateway does not
/// always terminate export streams properly. Write failures are returned and
/// leave whatever was already written in place.
async fn copy_lines<W>(response: &mut Response, sink: &mut W, content_id: &str) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut chunker = LineChunker::default();
    let mut written = 0_u64;
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) if !chunk.is_empty() => chunk,
            Ok(_) => break,
            Err(err) => {
                warn!(
                    content_id,
                    error = %err,
                    "export stream ended with a read error; keeping received data"
                );
                break;
            }
        };
        for line in chunker.push(&chunk) {
            sink.write_all(&line).await?;
            written += line.len() as u64;
        }
    }
    if let Some(rest) = chunker.finish() {
        sink.write_all(&rest).await?;
        written += rest.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}

/// Splits a byte stream on `\n`, keeping the delimiter on each piece.
#[derive(Debug, Default)]
struct LineChunker {
    pending: Vec<u8>,
}

impl LineChunker {
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for piece in chunk.split_inclusive(|byte| *byte == b'\n') {
            self.pending.extend_from_slice(piece);
            if piece.ends_with(b"\n") {
                lines.push(std::mem::take(&mut self.pending));
            }
        }
        lines
    }

    fn finish(self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then_some(self.pending)
    }
}

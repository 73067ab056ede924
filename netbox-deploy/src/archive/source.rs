//! Fetch the template tarball and rewrite it on the fly

use std::io::{self, Write};

use reqwest::{Client, Response};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::archive::reader::{ChunkReader, ChunkResult};
use crate::archive::rewrite::{transform_archive, RewriteStats};
use crate::errors::DeployerError;

/// Chunks buffered between the download and the rewrite stages
const CHUNK_BUFFER: usize = 16;

/// Tarball download URL of a repository ref
pub fn template_tarball_url(repo: &str, git_ref: &str) -> String {
    format!("{}/tarball/{}", repo.trim_end_matches('/'), git_ref)
}

/// Download `url`, inject `version` into its manifest and write the
/// recompressed archive to `sink`.
///
/// Fails without touching the sink when the download does not return a
/// success status. Any later failure, whether in the download, the gzip or
/// tar framing, or the manifest, fails the whole call.
pub async fn rewrite_source_blob_into<W>(
    client: &Client,
    url: &str,
    version: &str,
    sink: W,
) -> Result<(W, RewriteStats), DeployerError>
where
    W: Write + Send + 'static,
{
    info!("Fetching source tarball {}", url);
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        error!("Source tarball request to {} failed: {}", url, status);
        return Err(DeployerError::FetchError {
            url: url.to_string(),
            status,
        });
    }

    let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
    let version = version.to_string();
    let pipeline = tokio::task::spawn_blocking(move || {
        transform_archive(ChunkReader::new(rx), sink, &version)
    });

    let downloaded = pump(response, tx).await;
    let transformed = pipeline
        .await
        .map_err(|e| DeployerError::Internal(format!("rewrite task failed: {}", e)))?;

    // A broken download also shows up as a read error inside the pipeline;
    // report the root cause
    let bytes_in = downloaded?;
    let (sink, stats) = transformed?;
    debug!("Read {} compressed bytes, rewrote {} entries", bytes_in, stats.entries);
    Ok((sink, stats))
}

/// Download and rewrite into memory
pub async fn rewrite_source_blob(client: &Client, url: &str, version: &str) -> Result<Vec<u8>, DeployerError> {
    let (output, _) = rewrite_source_blob_into(client, url, version, Vec::new()).await?;
    info!("Rewritten source tarball is {} bytes", output.len());
    Ok(output)
}

/// Forward the response body into the channel. Returns the number of bytes
/// forwarded; stops quietly when the consumer has gone away.
async fn pump(mut response: Response, tx: mpsc::Sender<ChunkResult>) -> Result<u64, DeployerError> {
    let mut total = 0u64;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                total += chunk.len() as u64;
                if tx.send(Ok(chunk)).await.is_err() {
                    debug!("Rewrite stopped reading after {} bytes", total);
                    return Ok(total);
                }
            }
            Ok(None) => return Ok(total),
            Err(e) => {
                let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                return Err(e.into());
            }
        }
    }
}

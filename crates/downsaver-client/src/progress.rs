//! Upload bodies that report how many bytes have been handed to the transport.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use downsaver_core::models::{SourceData, SourceFile};
use downsaver_core::AppError;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::multipart::Part;
use tokio_util::io::ReaderStream;

/// `(bytes_loaded, bytes_total)` callback invoked as the body is consumed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

const CHUNK_SIZE: usize = 64 * 1024;

pub fn progress_fn<F>(f: F) -> ProgressFn
where
    F: Fn(u64, u64) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stream of the source bytes, in chunks, without loading files into memory.
async fn source_stream(
    source: &SourceFile,
) -> Result<BoxStream<'static, io::Result<Bytes>>, AppError> {
    match source.data() {
        SourceData::Memory(bytes) => {
            let bytes = bytes.clone();
            let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
                .step_by(CHUNK_SIZE)
                .map(|start| Ok(bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len()))))
                .collect();
            Ok(stream::iter(chunks).boxed())
        }
        SourceData::File(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                AppError::Internal(format!("Failed to open {}: {}", path.display(), e))
            })?;
            Ok(ReaderStream::with_capacity(file, CHUNK_SIZE).boxed())
        }
    }
}

/// Wrap the source in a stream that calls `on_progress` with the cumulative byte count after
/// every chunk. The first call reports zero before any byte is read.
pub async fn counting_stream(
    source: &SourceFile,
    on_progress: Option<ProgressFn>,
) -> Result<BoxStream<'static, io::Result<Bytes>>, AppError> {
    let total = source.size();
    let inner = source_stream(source).await?;

    let Some(on_progress) = on_progress else {
        return Ok(inner);
    };

    on_progress(0, total);
    let mut loaded = 0u64;
    Ok(inner
        .inspect_ok(move |chunk| {
            loaded += chunk.len() as u64;
            on_progress(loaded, total);
        })
        .boxed())
}

/// Multipart `file` part with a known length, streamed from the source.
pub async fn file_part(
    source: &SourceFile,
    on_progress: Option<ProgressFn>,
) -> Result<Part, AppError> {
    let stream = counting_stream(source, on_progress).await?;
    let body = reqwest::Body::wrap_stream(stream);
    Part::stream_with_length(body, source.size())
        .file_name(source.name().to_string())
        .mime_str("application/octet-stream")
        .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<(u64, u64)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (
            progress_fn(move |loaded, total| sink.lock().unwrap().push((loaded, total))),
            seen,
        )
    }

    #[tokio::test]
    async fn memory_source_reports_cumulative_counts() {
        let source = SourceFile::from_bytes("a.3dm", vec![7u8; CHUNK_SIZE * 2 + 10]);
        let (on_progress, seen) = recorder();

        let chunks: Vec<Bytes> = counting_stream(&source, Some(on_progress))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let total = source.size();
        assert_eq!(chunks.iter().map(|c| c.len() as u64).sum::<u64>(), total);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (0, total),
                (CHUNK_SIZE as u64, total),
                (CHUNK_SIZE as u64 * 2, total),
                (total, total)
            ]
        );
    }

    #[tokio::test]
    async fn file_source_is_streamed_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.3dm");
        std::fs::write(&path, vec![1u8; CHUNK_SIZE + 1]).unwrap();
        let source = SourceFile::open(&path).await.unwrap();
        let (on_progress, seen) = recorder();

        let chunks: Vec<Bytes> = counting_stream(&source, Some(on_progress))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.concat().len(), CHUNK_SIZE + 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&(0, source.size())));
        assert_eq!(seen.last(), Some(&(source.size(), source.size())));
    }
}

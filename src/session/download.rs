//! Export of the processed video to local disk

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::analysis::bytes_to_mb;
use crate::error::{ClientError, ClientResult};
use crate::transport::AnalysisTransport;

/// `cricket-analysis-<UTC timestamp>.mp4`, with `:` and `.` made filename-safe
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("cricket-analysis-{}.mp4", stamp)
}

/// Stream the video at `url` into `dir` and return the saved path.
///
/// Bytes land in a `.part` file first; the final name only appears once the
/// whole body has been written.
pub async fn export_video(
    transport: &dyn AnalysisTransport,
    url: &str,
    dir: &Path,
    now: DateTime<Utc>,
) -> ClientResult<PathBuf> {
    let file_name = export_file_name(now);
    let target = dir.join(&file_name);
    let partial = dir.join(format!("{}.part", file_name));

    log::info!("Downloading processed video {} to {}", url, target.display());

    fs::create_dir_all(dir).await.map_err(|e| {
        ClientError::playback(format!("Failed to create download directory: {}", e))
    })?;

    let mut stream = transport.fetch_video(url).await?;
    let mut file = fs::File::create(&partial)
        .await
        .map_err(|e| ClientError::playback(format!("Failed to create file: {}", e)))?;

    let mut written = 0u64;
    let outcome: ClientResult<()> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ClientError::playback(format!("Failed to write video: {}", e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ClientError::playback(format!("Failed to flush file: {}", e)))?;
        if written == 0 {
            return Err(ClientError::playback("Processed video is empty"));
        }
        Ok(())
    }
    .await;
    drop(file);

    if let Err(e) = outcome {
        if let Err(cleanup) = fs::remove_file(&partial).await {
            log::warn!("Could not remove partial download {}: {}", partial.display(), cleanup);
        }
        return Err(e);
    }

    fs::rename(&partial, &target)
        .await
        .map_err(|e| ClientError::playback(format!("Failed to save video: {}", e)))?;

    log::info!("Saved processed video ({:.2} MB) to {}", bytes_to_mb(written), target.display());
    Ok(target)
}

use crate::crawlers::Fetcher;
use crate::error::DownloadError;
use crate::results::ElementRecord;
use crate::utils::pdf_filename;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of a bulk download
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DownloadReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Files written, in download order
    pub saved: Vec<PathBuf>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Downloads every PDF record into `dir`, pausing `stagger` between requests.
///
/// A failed download is logged and counted; it never stops the batch.
pub async fn download_all<F: Fetcher>(
    fetcher: &F,
    records: &[ElementRecord],
    dir: &Path,
    stagger: Duration,
) -> DownloadReport {
    let mut report = DownloadReport::default();
    let mut taken = Vec::new();

    for (index, record) in records.iter().filter(|r| r.is_pdf && !r.href.is_empty()).enumerate() {
        if index > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let path = unique_path(dir, &filename_for(record), &mut taken);
        match download_one(fetcher, &record.href, &path).await {
            Ok(bytes) => {
                ::log::info!("Saved {} ({} bytes) to {}", record.href, bytes, path.display());
                report.succeeded += 1;
                report.saved.push(path);
            }
            Err(e) => {
                ::log::error!("Download of {} failed: {}", record.href, e);
                report.failed += 1;
            }
        }
    }

    ::log::info!(
        "Downloads finished - {} succeeded, {} failed",
        report.succeeded,
        report.failed
    );
    report
}

async fn download_one<F: Fetcher>(
    fetcher: &F,
    url: &str,
    path: &Path,
) -> Result<usize, DownloadError> {
    let bytes = fetcher.fetch_bytes(url).await?;
    let write_error = |source| DownloadError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(write_error)?;
    }
    tokio::fs::write(path, &bytes).await.map_err(write_error)?;
    Ok(bytes.len())
}

fn filename_for(record: &ElementRecord) -> String {
    let fallback = record
        .pdf_info
        .as_ref()
        .map(|info| info.filename.as_str())
        .unwrap_or_default();
    pdf_filename(&record.text, fallback)
}

/// Appends `_2`, `_3`, ... when several records share a filename in one batch
fn unique_path(dir: &Path, filename: &str, taken: &mut Vec<String>) -> PathBuf {
    let stem = filename.strip_suffix(".pdf").unwrap_or(filename);
    let mut candidate = filename.to_string();
    let mut n = 1;
    while taken.contains(&candidate) {
        n += 1;
        candidate = format!("{}_{}.pdf", stem, n);
    }
    taken.push(candidate.clone());
    dir.join(candidate)
}

use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::Config;
use crate::domain::NetworkDescriptor;
use crate::error::MirrorError;
use crate::manifest;
use crate::ndex::{CatalogClient, ContentFetcher, build_manifest};
use crate::sink::ObjectSink;
use crate::transfer::{Dispatcher, TransferReport};

#[derive(Debug, Clone, Serialize)]
pub struct ManifestResult {
    pub path: Utf8PathBuf,
    pub networks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub manifest: ManifestResult,
    pub transfer: TransferReport,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

/// Receives progress lines. Transfers report from many threads at once.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: CatalogClient, F: ContentFetcher, S: ObjectSink> {
    catalog: C,
    dispatcher: Dispatcher<F, S>,
    manifest_path: Utf8PathBuf,
}

impl<C: CatalogClient, F: ContentFetcher, S: ObjectSink> App<C, F, S> {
    pub fn new(catalog: C, fetcher: F, sink: S, config: &Config) -> Self {
        Self {
            catalog,
            dispatcher: Dispatcher::new(
                fetcher,
                sink,
                config.bucket.clone(),
                config.transfer_options(),
            ),
            manifest_path: config.manifest_path.clone(),
        }
    }

    pub fn manifest_path(&self) -> &Utf8Path {
        &self.manifest_path
    }

    pub fn dispatcher(&self) -> &Dispatcher<F, S> {
        &self.dispatcher
    }

    /// Queries the catalog and writes the manifest. Nothing is written when
    /// the search response fails validation.
    pub fn generate_manifest(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<ManifestResult, MirrorError> {
        sink.event(ProgressEvent {
            message: "phase=Search; querying NDEx catalog".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let descriptors = build_manifest(&self.catalog)?;
        sink.event(ProgressEvent {
            message: format!(
                "Number of networks that will be written to the manifest: {}",
                descriptors.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        manifest::write(&self.manifest_path, &descriptors)?;
        sink.event(ProgressEvent {
            message: format!("phase=Store; manifest written to {}", self.manifest_path),
            elapsed: Some(start.elapsed()),
        });

        Ok(ManifestResult {
            path: self.manifest_path.clone(),
            networks: descriptors.len(),
        })
    }

    /// Reads the manifest and transfers every network in it.
    ///
    /// Only a missing or unreadable manifest is an error here. Failed and
    /// skipped units are recorded in the report; pass it to
    /// [`ensure_success`] to turn them into [`MirrorError::TransferFailed`].
    pub fn transfer(&self, sink: &dyn ProgressSink) -> Result<TransferReport, MirrorError> {
        let descriptors = manifest::read(&self.manifest_path)?;
        Ok(self.transfer_descriptors(&descriptors, sink))
    }

    pub fn transfer_descriptors(
        &self,
        descriptors: &[NetworkDescriptor],
        sink: &dyn ProgressSink,
    ) -> TransferReport {
        sink.event(ProgressEvent {
            message: format!(
                "phase=Transfer; {} networks to {}",
                descriptors.len(),
                self.dispatcher.bucket()
            ),
            elapsed: None,
        });
        let start = Instant::now();
        let report = self.dispatcher.dispatch_all(descriptors, sink);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; uploaded={} failed={} skipped={}",
                report.uploaded, report.failed, report.skipped
            ),
            elapsed: Some(start.elapsed()),
        });
        report
    }

    /// Writes the manifest, then transfers it. Unit failures are left in the
    /// report as with [`App::transfer`].
    pub fn sync(&self, sink: &dyn ProgressSink) -> Result<SyncResult, MirrorError> {
        let manifest = self.generate_manifest(sink)?;
        let transfer = self.transfer(sink)?;
        Ok(SyncResult { manifest, transfer })
    }
}

pub fn ensure_success(report: &TransferReport) -> Result<(), MirrorError> {
    if report.is_success() {
        return Ok(());
    }
    Err(MirrorError::TransferFailed {
        failed: report.failed,
        skipped: report.skipped,
        total: report.total,
    })
}

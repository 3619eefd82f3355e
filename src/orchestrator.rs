//! Run discovery and ingestion across protocols and network scales.
//!
//! Files are processed one at a time, protocols in configured order and
//! scales ascending as listed, so the resulting collection is deterministic.

use color_eyre::eyre::Result;

use crate::config::AnalysisConfig;
use crate::flowmon::RunCollection;

/// Outcome counts for one collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub files_ingested: usize,
    pub files_missing: usize,
    pub files_failed: usize,
}

/// Ingest every configured (protocol, scale) pair into a new collection.
///
/// Missing flow monitor logs are skipped with a warning; a missing counters
/// log leaves counters at zero. Ingestion failures skip the pair unless
/// `strict` is set, in which case the first failure is returned.
pub fn collect_runs(config: &AnalysisConfig, strict: bool) -> Result<(RunCollection, CollectionSummary)> {
    let mut runs = RunCollection::new();
    let mut summary = CollectionSummary::default();

    for protocol in &config.input.protocols {
        runs.register_protocol(protocol);

        for &scale in &config.input.network_sizes {
            let flowmon_path = config.input.flowmon_path(protocol, scale);
            if !flowmon_path.exists() {
                log::warn!("No flow monitor log at {}, skipping", flowmon_path.display());
                summary.files_missing += 1;
                continue;
            }

            let counters_path = config
                .input
                .counters_path(protocol, scale)
                .filter(|path| {
                    let exists = path.exists();
                    if !exists {
                        log::warn!(
                            "No counters log at {}, routing and energy counters default to zero",
                            path.display()
                        );
                    }
                    exists
                });

            match runs.ingest_file(protocol, scale, &flowmon_path, counters_path.as_deref(), &config.metrics) {
                Ok(_) => summary.files_ingested += 1,
                Err(e) if !strict => {
                    log::error!("{:#}", e);
                    summary.files_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    log::info!(
        "Collected {} runs from {} files ({} missing, {} failed)",
        runs.total_runs(),
        summary.files_ingested,
        summary.files_missing,
        summary.files_failed
    );

    Ok((runs, summary))
}

//! One request's worth of work: load the sources, resolve chemists, build
//! the report. The binary maps each subcommand onto one of these calls.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{Freshness, ReadThroughCache};
use crate::details::{ChemistDirectory, DETAILS_DESCRIPTION, EntityDetail};
use crate::error::ReportError;
use crate::months::Month;
use crate::records::{DISPENSING_DESCRIPTION, Dataset, EntityId};
use crate::report::{AggregateOptions, PeriodFilter, Report, ReportTable, build_report};
use crate::source::{DataLocation, SourceLoader};

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub first: String,
    pub second: Option<String>,
    pub filter: PeriodFilter,
    pub options: AggregateOptions,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report: Report,
    pub table: ReportTable,
    pub filename: String,
}

/// Valid years (most recent first) and months present in the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailablePeriods {
    pub years: Vec<u32>,
    pub months: Vec<Month>,
}

pub struct ReportService {
    loader: SourceLoader,
    data: DataLocation,
    details: DataLocation,
    directory_cache: ReadThroughCache<ChemistDirectory>,
}

/// Chemist numbers typed by a user must be whole numbers.
pub fn parse_chemist(raw: &str) -> Result<EntityId, ReportError> {
    EntityId::parse(raw)
        .filter(|id| id.number().is_some())
        .ok_or_else(|| ReportError::InvalidChemist(raw.trim().to_string()))
}

impl ReportService {
    pub fn new(loader: SourceLoader, data: DataLocation, details: DataLocation) -> Self {
        Self {
            loader,
            data,
            details,
            directory_cache: ReadThroughCache::new(),
        }
    }

    /// Loads and types the dispensing data. Never cached.
    pub async fn load_dataset(&self) -> Result<Dataset, ReportError> {
        let table = self.loader.load(&self.data, DISPENSING_DESCRIPTION).await?;
        Ok(Dataset::from_table(&table)?)
    }

    /// Loads the chemist reference table through the read-through cache:
    /// file modification time for local files, process lifetime for blobs.
    pub async fn directory(&self) -> Result<Arc<ChemistDirectory>, ReportError> {
        let freshness = match self.details.local_path() {
            Some(path) => Freshness::ModifiedAt(path.to_path_buf()),
            None => Freshness::ProcessLifetime,
        };
        let key = self.details.to_string();

        self.directory_cache
            .get_or_reload(&key, &freshness, || async {
                let table = self.loader.load(&self.details, DETAILS_DESCRIPTION).await?;
                ChemistDirectory::from_table(&table)
            })
            .await
            .map_err(ReportError::ReferenceDataUnavailable)
    }

    #[tracing::instrument(skip(self), fields(first = %request.first, second = ?request.second))]
    pub async fn run(&self, request: &ReportRequest) -> Result<ReportOutcome, ReportError> {
        let first = parse_chemist(&request.first)?;
        let second = request
            .second
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_chemist)
            .transpose()?;

        if second.as_ref() == Some(&first) {
            info!("Same chemist selected twice; showing a single view");
        }

        let dataset = self.load_dataset().await?;

        // Names and addresses are display-only; the report still runs without them.
        let directory = match self.directory().await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Chemist details unavailable, using placeholders");
                Arc::new(ChemistDirectory::default())
            }
        };

        let report = build_report(
            &dataset,
            &directory,
            &first,
            second.as_ref(),
            &request.filter,
            &request.options,
        );
        let table = ReportTable::from(&report);
        let filename = report.download_filename(&request.filter);

        info!(rows = table.rows.len(), comparison = report.is_comparison(), "Report ready");
        Ok(ReportOutcome {
            report,
            table,
            filename,
        })
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<EntityDetail>, ReportError> {
        let directory = self.directory().await?;
        Ok(directory.search(query, limit).into_iter().cloned().collect())
    }

    /// Every chemist in the reference table, identifier ascending.
    pub async fn chemists(&self) -> Result<Vec<EntityDetail>, ReportError> {
        Ok(self.directory().await?.entries().to_vec())
    }

    pub async fn periods(&self) -> Result<AvailablePeriods, ReportError> {
        let dataset = self.load_dataset().await?;
        Ok(AvailablePeriods {
            years: dataset.years(),
            months: dataset.months(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::source::DEFAULT_ENCODINGS;
    use crate::source::blob::memory::MemoryBlobStore;

    fn service(store: Arc<MemoryBlobStore>) -> ReportService {
        ReportService::new(
            SourceLoader::new(DEFAULT_ENCODINGS.to_vec()).with_blob_store(store),
            "s3://bucket/data.csv".parse().unwrap(),
            "s3://bucket/details.csv".parse().unwrap(),
        )
    }

    fn request(first: &str, second: Option<&str>) -> ReportRequest {
        ReportRequest {
            first: first.into(),
            second: second.map(String::from),
            filter: PeriodFilter::default(),
            options: AggregateOptions::default(),
        }
    }

    fn seeded() -> Arc<MemoryBlobStore> {
        let store = Arc::new(MemoryBlobStore::default());
        store.put(
            "bucket",
            "data.csv",
            &b"Practice,Chemist,Year,Month,Number of Items\nP,7,2023,1,10\nP,9,2023,2,20\n"[..],
        );
        store.put("bucket", "details.csv", &b"Chemist ID,Name\n7,Corner\n9,Main St\n"[..]);
        store
    }

    #[test]
    fn test_parse_chemist() {
        assert_eq!(parse_chemist(" 7 ").unwrap().as_str(), "7");
        assert!(matches!(parse_chemist("seven"), Err(ReportError::InvalidChemist(_))));
        assert!(parse_chemist("").is_err());
    }

    #[tokio::test]
    async fn test_comparison_request() {
        let outcome = service(seeded()).run(&request("7", Some("9"))).await.unwrap();
        assert!(outcome.report.is_comparison());
        assert_eq!(outcome.table.rows.len(), 2);
        assert_eq!(outcome.filename, "Compare_C7_vs_C9_ALL_Data.xlsx");
        assert_eq!(outcome.table.title, "7 (Corner) vs 9 (Main St)");
    }

    #[tokio::test]
    async fn test_blank_second_chemist_is_single() {
        let outcome = service(seeded()).run(&request("7", Some("  "))).await.unwrap();
        assert!(!outcome.report.is_comparison());
        assert_eq!(outcome.filename, "Chemist7_FilteredData_ALL_Data.xlsx");
    }

    #[tokio::test]
    async fn test_missing_details_degrade_to_placeholders() {
        let store = Arc::new(MemoryBlobStore::default());
        store.put("bucket", "data.csv", &b"Chemist,Year,Month,Number of Items\n7,2023,1,10\n"[..]);

        let svc = service(store);
        let outcome = svc.run(&request("7", None)).await.unwrap();
        assert_eq!(outcome.table.title, "7 (Name not found)");

        let err = svc.search("x", 20).await.unwrap_err();
        assert!(matches!(
            err,
            ReportError::ReferenceDataUnavailable(LoadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_not_found() {
        let store = Arc::new(MemoryBlobStore::default());
        let err = service(store).run(&request("7", None)).await.unwrap_err();
        assert!(matches!(err, ReportError::Load(LoadError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_directory_is_cached_for_blobs() {
        let store = seeded();
        let svc = service(store.clone());

        svc.search("corner", 20).await.unwrap();
        let before = store.read_count();
        let hits = svc.search("main", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.read_count(), before);
    }

    #[tokio::test]
    async fn test_periods() {
        let periods = service(seeded()).periods().await.unwrap();
        assert_eq!(periods.years, vec![2023]);
        assert_eq!(periods.months, vec![Month::January, Month::February]);
    }
}

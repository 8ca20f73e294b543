//! Harvest mode: query every source for every sector and merge the results.

use tracing::{info, warn};

use super::paginate::{PageCaps, Paginator};
use super::pacing::{Pacer, Pause};
use super::retry::RetryPolicy;
use crate::merge::IdentityMerger;
use crate::sectors::Sector;
use crate::sources::{MetadataSource, SourceQuery};

/// Default records requested from `OpenAlex` per sector.
pub const DEFAULT_PER_SECTOR: usize = 200;

/// Default divisor applied to the per-sector cap for arXiv.
pub const DEFAULT_ARXIV_SHARE: usize = 4;

/// Page size used for `OpenAlex` in harvest mode.
const HARVEST_PAGE_SIZE: usize = 100;

/// Per-source record caps for one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestPlan {
    /// Records requested from `OpenAlex` per sector.
    pub per_sector: usize,
    /// Divisor applied to `per_sector` for the arXiv cap.
    pub arxiv_share: usize,
}

impl Default for HarvestPlan {
    fn default() -> Self {
        Self {
            per_sector: DEFAULT_PER_SECTOR,
            arxiv_share: DEFAULT_ARXIV_SHARE,
        }
    }
}

impl HarvestPlan {
    /// Cap for the primary source.
    #[must_use]
    pub fn primary_cap(&self) -> usize {
        self.per_sector
    }

    /// Cap for arXiv: `per_sector / arxiv_share`.
    #[must_use]
    pub fn arxiv_cap(&self) -> usize {
        self.per_sector / self.arxiv_share.max(1)
    }

    /// Cap for CORE: half of `per_sector`.
    #[must_use]
    pub fn core_cap(&self) -> usize {
        self.per_sector / 2
    }
}

/// A source failure that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Sector whose query failed.
    pub sector: String,
    /// Name of the failing source.
    pub source: &'static str,
    /// Rendered error.
    pub message: String,
}

/// Counters for a harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Records received from all sources.
    pub fetched: usize,
    /// Records that started a new merged entry.
    pub created: usize,
    /// Records dropped for lack of a canonical key.
    pub unkeyed: usize,
    /// Sources that failed for a sector.
    pub failures: Vec<SourceFailure>,
}

/// Drives every configured source over a sector table.
pub struct CorpusHarvester<'a> {
    openalex: &'a dyn MetadataSource,
    arxiv: &'a dyn MetadataSource,
    core: Option<&'a dyn MetadataSource>,
    plan: HarvestPlan,
    pacer: &'a Pacer,
    retry: &'a RetryPolicy,
}

impl std::fmt::Debug for CorpusHarvester<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusHarvester")
            .field("core", &self.core.is_some())
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl<'a> CorpusHarvester<'a> {
    /// Creates a harvester; CORE is queried only when `core` is given.
    #[must_use]
    pub fn new(
        openalex: &'a dyn MetadataSource,
        arxiv: &'a dyn MetadataSource,
        core: Option<&'a dyn MetadataSource>,
        plan: HarvestPlan,
        pacer: &'a Pacer,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            openalex,
            arxiv,
            core,
            plan,
            pacer,
            retry,
        }
    }

    /// Harvests every sector in order into `merger`.
    ///
    /// A failing source is recorded in the summary and the run moves on.
    pub async fn harvest(&self, sectors: &[Sector], merger: &mut IdentityMerger) -> HarvestSummary {
        let mut summary = HarvestSummary::default();
        let unkeyed_before = merger.unkeyed_count();

        for sector in sectors {
            let phrase = sector.query_phrase();
            info!(sector = %sector.name, query = %phrase, "harvesting sector");

            let mut plan: Vec<(&dyn MetadataSource, usize, usize)> = vec![
                (self.openalex, self.plan.primary_cap(), HARVEST_PAGE_SIZE),
                (self.arxiv, self.plan.arxiv_cap(), self.plan.arxiv_cap()),
            ];
            if let Some(core) = self.core {
                plan.push((core, self.plan.core_cap(), self.plan.core_cap()));
            }

            for (index, (source, cap, page_size)) in plan.into_iter().enumerate() {
                if index > 0 {
                    self.pacer.pause(Pause::BetweenPages).await;
                }
                if cap == 0 {
                    continue;
                }
                self.harvest_source(source, sector, &phrase, cap, page_size, merger, &mut summary)
                    .await;
            }
        }

        summary.unkeyed = merger.unkeyed_count() - unkeyed_before;
        info!(
            fetched = summary.fetched,
            unique = merger.len(),
            unkeyed = summary.unkeyed,
            failures = summary.failures.len(),
            "harvest complete"
        );
        summary
    }

    #[allow(clippy::too_many_arguments)]
    async fn harvest_source(
        &self,
        source: &dyn MetadataSource,
        sector: &Sector,
        phrase: &str,
        cap: usize,
        page_size: usize,
        merger: &mut IdentityMerger,
        summary: &mut HarvestSummary,
    ) {
        let mut pages = Paginator::new(
            source,
            SourceQuery::Search(phrase.to_string()),
            page_size,
            PageCaps::items(cap),
            self.pacer,
            self.retry,
        );
        loop {
            match pages.next_page().await {
                Ok(Some(records)) => {
                    for record in records {
                        summary.fetched += 1;
                        if merger.ingest(record, &sector.name).created {
                            summary.created += 1;
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(sector = %sector.name, source = source.name(), error = %error, "source failed for sector");
                    summary.failures.push(SourceFailure {
                        sector: sector.name.clone(),
                        source: source.name(),
                        message: error.to_string(),
                    });
                    break;
                }
            }
        }
        info!(
            sector = %sector.name,
            source = source.name(),
            records = pages.items_yielded(),
            "source done"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::FetchError;
    use crate::record::Record;
    use crate::sources::{PageToken, SourceError, SourcePage};

    /// Returns the given titles for any query, once, and logs the page sizes it saw.
    struct FixedSource {
        name: &'static str,
        titles: Vec<&'static str>,
        fail: bool,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FixedSource {
        fn new(name: &'static str, titles: Vec<&'static str>) -> Self {
            Self {
                name,
                titles,
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, Vec::new())
            }
        }
    }

    #[async_trait]
    impl MetadataSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn first_page(&self) -> PageToken {
            PageToken::Offset(0)
        }

        fn max_page_size(&self) -> usize {
            100
        }

        async fn fetch_page(
            &self,
            query: &SourceQuery,
            _token: &PageToken,
            page_size: usize,
        ) -> Result<SourcePage, SourceError> {
            let SourceQuery::Search(phrase) = query else {
                unreachable!("harvest only searches");
            };
            self.calls.lock().unwrap().push((phrase.clone(), page_size));
            if self.fail {
                return Err(FetchError::http_status("https://core.example", 401).into());
            }
            Ok(SourcePage {
                records: self
                    .titles
                    .iter()
                    .map(|t| Record::new(self.name, *t, *t))
                    .collect(),
                next: None,
            })
        }
    }

    fn sectors() -> Vec<Sector> {
        vec![
            Sector {
                name: "Energy".to_string(),
                keywords: vec!["energy".to_string(), "power".to_string(), "solar".to_string()],
            },
            Sector {
                name: "Water".to_string(),
                keywords: vec!["water".to_string()],
            },
        ]
    }

    #[test]
    fn test_plan_caps() {
        let plan = HarvestPlan {
            per_sector: 200,
            arxiv_share: 4,
        };
        assert_eq!(plan.primary_cap(), 200);
        assert_eq!(plan.arxiv_cap(), 50);
        assert_eq!(plan.core_cap(), 100);
        let zero_share = HarvestPlan {
            per_sector: 10,
            arxiv_share: 0,
        };
        assert_eq!(zero_share.arxiv_cap(), 10);
    }

    #[tokio::test]
    async fn test_harvest_merges_across_sources_and_sectors() {
        let openalex = FixedSource::new("openalex", vec!["Solar Grids", "Dams"]);
        let arxiv = FixedSource::new("arxiv", vec!["solar grids!", "", "Wave Power"]);
        let pacer = Pacer::disabled();
        let retry = RetryPolicy::default();
        let harvester = CorpusHarvester::new(&openalex, &arxiv, None, HarvestPlan::default(), &pacer, &retry);

        let mut merger = IdentityMerger::new();
        let summary = harvester.harvest(&sectors(), &mut merger).await;

        assert_eq!(merger.len(), 3);
        assert_eq!(summary.fetched, 10);
        assert_eq!(summary.created, 3);
        assert_eq!(summary.unkeyed, 2);
        assert!(summary.failures.is_empty());

        let first = merger.iter().next().unwrap();
        assert_eq!(first.record().title, "Solar Grids");
        assert_eq!(first.query_sector(), "Energy");
        assert_eq!(first.assigned_sectors().len(), 2);
        assert_eq!(first.provenance_sources().len(), 2);

        let calls = openalex.calls.lock().unwrap().clone();
        assert_eq!(calls[0], ("energy power".to_string(), 100));
        assert_eq!(calls[1], ("water".to_string(), 100));
        assert_eq!(arxiv.calls.lock().unwrap()[0].1, 50);
    }

    #[tokio::test]
    async fn test_failing_core_is_recorded_and_skipped() {
        let openalex = FixedSource::new("openalex", vec!["A"]);
        let arxiv = FixedSource::new("arxiv", vec![]);
        let core = FixedSource::failing("core");
        let pacer = Pacer::disabled();
        let retry = RetryPolicy::default();
        let harvester = CorpusHarvester::new(
            &openalex,
            &arxiv,
            Some(&core),
            HarvestPlan::default(),
            &pacer,
            &retry,
        );

        let mut merger = IdentityMerger::new();
        let summary = harvester.harvest(&sectors(), &mut merger).await;

        assert_eq!(merger.len(), 1);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].source, "core");
        assert_eq!(summary.failures[1].sector, "Water");
        assert_eq!(core.calls.lock().unwrap()[0].1, 100);
    }
}

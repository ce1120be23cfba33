// src/pipeline/orchestrator.rs

//! Multi-board crawl orchestration.
//!
//! Selects due boards, runs each board's crawl as an independent
//! execution unit bounded by a global concurrency limit, and records
//! one `CrawlRun` per attempt. Runs for the same board are serialized
//! through an in-flight guard; a failing board never touches another
//! board's run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Board, Config, CrawlRun, RunStatus};
use crate::pipeline::runner::crawl_board;
use crate::services::provision::ProcedureProvider;
use crate::storage::PostingStore;
use crate::utils::http::PageFetcher;

/// Per-board outcome of a sweep.
#[derive(Debug)]
pub enum BoardOutcome {
    /// A run was attempted; its record carries the result
    Ran(CrawlRun),
    /// No procedure and provisioning failed; surfaced for operators
    ProcedureMissing { board_id: String },
    /// A run for this board was already in flight
    AlreadyRunning { board_id: String },
    /// Last completed run is inside the crawl interval
    NotDue { board_id: String },
}

/// Result of one scheduled sweep.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub outcomes: Vec<BoardOutcome>,
}

impl SweepSummary {
    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BoardOutcome::Ran(_)))
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    BoardOutcome::Ran(run)
                        if matches!(run.status, RunStatus::Succeeded | RunStatus::Partial)
                )
            })
            .count()
    }

    pub fn procedure_missing(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BoardOutcome::ProcedureMissing { .. }))
            .count()
    }
}

/// Schedules and bounds crawls across many boards.
pub struct Orchestrator {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn PostingStore>,
    provider: Arc<dyn ProcedureProvider>,
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn PostingStore>,
        provider: Arc<dyn ProcedureProvider>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            provider,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Manual trigger: run one board now.
    ///
    /// Rejects immediately with `AlreadyRunning` when a run for the
    /// board is in flight. Due-ness is not checked; an operator asking
    /// for a crawl gets one.
    pub async fn trigger(&self, board: &Board) -> Result<CrawlRun> {
        self.run_isolated(board).await
    }

    /// Scheduled sweep: run every due active board, bounded by the
    /// global concurrency limit.
    pub async fn sweep(&self, boards: &[Board]) -> SweepSummary {
        let concurrency = self.config.crawler.max_concurrent.max(1);

        let outcomes: Vec<BoardOutcome> = stream::iter(boards.iter().filter(|b| b.active))
            .map(|board| async move {
                if !self.is_due(board).await {
                    return BoardOutcome::NotDue {
                        board_id: board.id.clone(),
                    };
                }

                match self.run_isolated(board).await {
                    Ok(run) => BoardOutcome::Ran(run),
                    Err(AppError::ProcedureMissing { board }) => {
                        BoardOutcome::ProcedureMissing { board_id: board }
                    }
                    Err(AppError::AlreadyRunning { board }) => {
                        BoardOutcome::AlreadyRunning { board_id: board }
                    }
                    // Run-level failures are captured in the CrawlRun;
                    // anything else surfacing here is a storage fault
                    // for this board alone.
                    Err(error) => {
                        log::error!("Board '{}' run aborted: {}", board.id, error);
                        let mut run = CrawlRun::start(&board.id);
                        run.finish(RunStatus::Failed, Some(error.to_string()));
                        BoardOutcome::Ran(run)
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let summary = SweepSummary { outcomes };
        log::info!(
            "Sweep complete: {} attempted, {} completed, {} missing procedures",
            summary.attempted(),
            summary.succeeded(),
            summary.procedure_missing()
        );
        summary
    }

    /// A board is due when it has never completed a run or its last
    /// completed run is older than the crawl interval.
    async fn is_due(&self, board: &Board) -> bool {
        match self.store.last_completed_run(&board.id).await {
            Ok(Some(last)) => {
                let interval = chrono::Duration::minutes(self.config.crawler.crawl_interval_mins);
                last.completed_at
                    .map(|at| chrono::Utc::now() - at >= interval)
                    .unwrap_or(true)
            }
            Ok(None) => true,
            Err(error) => {
                log::warn!("Board '{}': run history unavailable ({})", board.id, error);
                true
            }
        }
    }

    /// Run one board under the in-flight guard.
    async fn run_isolated(&self, board: &Board) -> Result<CrawlRun> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(board.id.clone()) {
                return Err(AppError::AlreadyRunning {
                    board: board.id.clone(),
                });
            }
        }

        let result = self.run_with_budget(board).await;

        self.in_flight.lock().await.remove(&board.id);
        result
    }

    /// Resolve the board's procedure, then execute the run inside the
    /// wall-clock budget.
    async fn run_with_budget(&self, board: &Board) -> Result<CrawlRun> {
        let board = self.ensure_procedure(board).await?;

        let mut run = CrawlRun::start(&board.id);
        self.store.record_run(&run).await?;

        let budget = Duration::from_secs(self.config.crawler.run_timeout_secs);
        let crawl = crawl_board(
            &self.config,
            self.fetcher.as_ref(),
            self.store.as_ref(),
            &board,
            &mut run,
        );

        match tokio::time::timeout(budget, crawl).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                // Storage fault mid-run; the record still gets a
                // terminal status so the board is not left stuck.
                if !run.is_terminal() {
                    run.finish(RunStatus::Failed, Some(error.to_string()));
                }
                if let Err(e) = self.store.record_run(&run).await {
                    log::error!("Board '{}': failed to persist run record: {}", board.id, e);
                }
            }
            Err(_elapsed) => {
                let timeout = AppError::Timeout {
                    board: board.id.clone(),
                    secs: self.config.crawler.run_timeout_secs,
                };
                log::warn!("{}", timeout);
                run.finish(RunStatus::Failed, Some(timeout.to_string()));
                if let Err(e) = self.store.record_run(&run).await {
                    log::error!("Board '{}': failed to persist run record: {}", board.id, e);
                }
            }
        }

        Ok(run)
    }

    /// Use the board's stored procedure, or ask the provider to derive
    /// one from a sample list page. Every failure on this path is
    /// `ProcedureMissing`: the board cannot be crawled until
    /// provisioning succeeds.
    async fn ensure_procedure(&self, board: &Board) -> Result<Board> {
        if board.procedure.is_some() {
            return Ok(board.clone());
        }

        log::info!(
            "Board '{}' has no extraction procedure; invoking provisioning",
            board.id
        );

        let sample = self
            .fetcher
            .fetch(&board.list_url(1))
            .await
            .map_err(|error| {
                log::warn!(
                    "Board '{}': sample page unavailable for provisioning ({})",
                    board.id,
                    error
                );
                AppError::ProcedureMissing {
                    board: board.id.clone(),
                }
            })?;

        let procedure = self.provider.provision(board, &sample).await.map_err(|_| {
            AppError::ProcedureMissing {
                board: board.id.clone(),
            }
        })?;

        let mut board = board.clone();
        board.set_procedure(procedure);
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttachmentRules, DetailRules, ExtractionProcedure, FieldRule, ListRules,
    };
    use crate::services::provision::PatternProvider;
    use crate::storage::MemoryStore;
    use crate::utils::http::testing::StaticFetcher;

    fn procedure() -> ExtractionProcedure {
        ExtractionProcedure {
            version: 1,
            list: ListRules {
                rows: vec!["tr:has(a)".to_string()],
                link: vec![FieldRule::attr("a", "href")],
                title: vec![FieldRule::text("a")],
                posted: vec![],
            },
            detail: DetailRules {
                title: vec![FieldRule::text("h1")],
                organization: vec![FieldRule::text(".org")],
                location: vec![],
                deadline: vec![],
                body: vec![FieldRule::text(".content")],
            },
            attachments: AttachmentRules::default(),
            region_rules: Vec::new(),
        }
    }

    fn board(id: &str) -> Board {
        Board {
            id: id.to_string(),
            name: format!("게시판 {id}"),
            url_template: format!("https://{id}.example/list?page={{page}}"),
            active: true,
            region: None,
            procedure: Some(procedure()),
        }
    }

    fn config() -> Arc<Config> {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.detail_retry_delay_ms = 0;
        Arc::new(config)
    }

    fn fetcher_for(ids: &[&str]) -> StaticFetcher {
        let mut fetcher = StaticFetcher::new();
        for id in ids {
            fetcher = fetcher
                .with_page(
                    format!("https://{id}.example/list?page=1"),
                    format!(
                        r#"<table><tr><td><a href="view?seq=1">{id} 공고</a></td></tr></table>"#
                    ),
                )
                .with_page(
                    format!("https://{id}.example/view?seq=1"),
                    format!(
                        r#"<h1>{id} 공고</h1><div class="org">교육청</div>
                           <div class="content">모집 분야와 지원 방법을 안내하는 본문입니다.</div>"#
                    ),
                );
        }
        fetcher
    }

    fn orchestrator(fetcher: StaticFetcher, store: Arc<MemoryStore>) -> Orchestrator {
        Orchestrator::new(
            config(),
            Arc::new(fetcher),
            store,
            Arc::new(PatternProvider::new()),
        )
    }

    #[tokio::test]
    async fn sweep_runs_all_active_boards() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(fetcher_for(&["a", "b"]), Arc::clone(&store));

        let mut inactive = board("c");
        inactive.active = false;
        let boards = vec![board("a"), board("b"), inactive];

        let summary = orch.sweep(&boards).await;
        assert_eq!(summary.attempted(), 2);
        assert_eq!(summary.succeeded(), 2);

        assert_eq!(store.list_postings("a").await.unwrap().len(), 1);
        assert_eq!(store.list_postings("b").await.unwrap().len(), 1);
        assert!(store.list_postings("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_board_does_not_affect_others() {
        let store = Arc::new(MemoryStore::new());
        // Board "bad" has no pages at all; "a" is healthy.
        let orch = orchestrator(fetcher_for(&["a"]), Arc::clone(&store));

        let summary = orch.sweep(&[board("a"), board("bad")]).await;
        assert_eq!(summary.attempted(), 2);

        let statuses: Vec<_> = summary
            .outcomes
            .iter()
            .filter_map(|o| match o {
                BoardOutcome::Ran(run) => Some((run.board_id.clone(), run.status)),
                _ => None,
            })
            .collect();

        assert!(statuses.contains(&("a".to_string(), RunStatus::Succeeded)));
        assert!(statuses.contains(&("bad".to_string(), RunStatus::Failed)));
        assert_eq!(store.list_postings("a").await.unwrap().len(), 1);

        let bad_runs = store.list_runs("bad").await.unwrap();
        assert_eq!(bad_runs.len(), 1);
        assert!(bad_runs[0].error.is_some());
    }

    #[tokio::test]
    async fn board_without_procedure_is_provisioned_on_demand() {
        let store = Arc::new(MemoryStore::new());
        // Markup matches the nx_cms pattern known to the provider.
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://a.example/list?page=1",
                r#"<table class="bl_list">
                     <tr><td class="td-subject"><a href="view?seq=1">공고</a></td>
                         <td class="td-date">2025-10-20</td></tr>
                   </table>"#,
            )
            .with_page(
                "https://a.example/view?seq=1",
                r#"<h1>공고 제목입니다</h1>
                   <div class="content">모집 분야와 지원 방법을 안내하는 본문입니다.</div>"#,
            );
        let orch = orchestrator(fetcher, Arc::clone(&store));

        let mut b = board("a");
        b.procedure = None;

        let run = orch.trigger(&b).await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.counts.inserted, 1);
    }

    #[tokio::test]
    async fn unknown_markup_surfaces_procedure_missing() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = StaticFetcher::new().with_page(
            "https://a.example/list?page=1",
            "<html><body>bespoke layout</body></html>",
        );
        let orch = orchestrator(fetcher, Arc::clone(&store));

        let mut b = board("a");
        b.procedure = None;

        let summary = orch.sweep(std::slice::from_ref(&b)).await;
        assert_eq!(summary.procedure_missing(), 1);
        assert_eq!(summary.attempted(), 0);
    }

    #[tokio::test]
    async fn not_due_board_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(fetcher_for(&["a"]), Arc::clone(&store));
        let boards = vec![board("a")];

        let first = orch.sweep(&boards).await;
        assert_eq!(first.attempted(), 1);

        // Within the interval the board is not due again.
        let second = orch.sweep(&boards).await;
        assert_eq!(second.attempted(), 0);
        assert!(matches!(
            second.outcomes[0],
            BoardOutcome::NotDue { .. }
        ));
    }

    #[tokio::test]
    async fn timeout_finalizes_run_as_failed() {
        let store = Arc::new(MemoryStore::new());

        // A fetcher that never resolves, to burn the budget.
        struct StallingFetcher;
        #[async_trait::async_trait]
        impl PageFetcher for StallingFetcher {
            async fn fetch(&self, _url: &str) -> Result<String> {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }

        let mut config = Config::default();
        config.crawler.run_timeout_secs = 1;
        let orch = Orchestrator::new(
            Arc::new(config),
            Arc::new(StallingFetcher),
            Arc::clone(&store) as Arc<dyn PostingStore>,
            Arc::new(PatternProvider::new()),
        );

        let run = orch.trigger(&board("a")).await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("timed out"));
        assert!(run.is_terminal());

        // The board is not stuck: a new trigger is accepted.
        let runs = store.list_runs("a").await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].completed_at.is_some());
    }
}

// src/pipeline/runner.rs

//! Single-board crawl execution.
//!
//! One run walks `Listing -> Detailing -> Reconciling -> Done`:
//! paginate the list view, visit each candidate's detail page, then
//! hand the extracted batch to the reconciler. Item-level failures
//! (missing field, dead detail link) mark the item skipped and never
//! abort the run; only an unreachable list page fails the run
//! outright.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Board, Config, CrawlRun, RunStatus};
use crate::pipeline::reconcile::{reconcile, ExtractedPosting};
use crate::services::extractor::{Extractor, ListItem};
use crate::services::attachments;
use crate::storage::PostingStore;
use crate::utils::http::PageFetcher;

/// Execute one crawl of one board, finalizing `run` in place.
///
/// The caller owns run-record persistence around this call (including
/// the timeout path, where this future is dropped mid-flight).
/// Storage errors propagate; everything else becomes run state.
pub async fn crawl_board(
    config: &Config,
    fetcher: &dyn PageFetcher,
    store: &dyn PostingStore,
    board: &Board,
    run: &mut CrawlRun,
) -> Result<()> {
    let Some(procedure) = &board.procedure else {
        run.finish(
            RunStatus::Failed,
            Some(
                AppError::ProcedureMissing {
                    board: board.id.clone(),
                }
                .to_string(),
            ),
        );
        store.record_run(run).await?;
        return Ok(());
    };

    let extractor = Extractor::new(procedure, &config.extraction);
    let delay = Duration::from_millis(config.crawler.request_delay_ms);

    // Listing
    let items = match collect_list_items(config, fetcher, &extractor, board, delay).await {
        Ok(items) => items,
        Err(error) => {
            log::warn!("Board '{}' list page unreachable: {}", board.id, error);
            run.finish(RunStatus::Failed, Some(error.to_string()));
            store.record_run(run).await?;
            return Ok(());
        }
    };
    run.counts.discovered = items.len();
    log::info!(
        "Board '{}': {} candidate items discovered",
        board.id,
        items.len()
    );

    // Detailing
    let mut batch: Vec<ExtractedPosting> = Vec::new();
    let mut skip_reasons: Vec<String> = Vec::new();

    for item in &items {
        if is_fresh(config, store, board, item).await? {
            run.counts.unchanged += 1;
            continue;
        }

        let html = match fetch_with_retry(config, fetcher, &item.link, run).await {
            Ok(html) => html,
            Err(error) => {
                run.counts.skipped += 1;
                let reason = format!("{}: {}", item.link, error);
                log::warn!("Board '{}': detail skipped, {}", board.id, reason);
                skip_reasons.push(reason);
                continue;
            }
        };

        match extractor.extract_detail(&html, &item.link) {
            Ok(fields) => {
                let attachment_url = fields.primary_attachment().and_then(|attachment| {
                    attachments::resolve(
                        &attachment.url,
                        attachment.filename.as_deref(),
                        &config.attachments,
                    )
                });

                batch.push(ExtractedPosting {
                    locator: item.locator.clone(),
                    source_url: item.link.clone(),
                    organization: fields.organization,
                    title: fields.title,
                    location: fields.location,
                    deadline: fields.deadline,
                    body: fields.body,
                    attachment_url,
                    region: fields.region.or_else(|| board.region.clone()),
                });
            }
            Err(error @ AppError::FieldMissing { .. }) => {
                run.counts.skipped += 1;
                let reason = format!("{}: {}", item.link, error);
                log::warn!("Board '{}': item skipped, {}", board.id, reason);
                skip_reasons.push(reason);
            }
            Err(error) => return Err(error),
        }

        if delay.as_millis() > 0 {
            tokio::time::sleep(delay).await;
        }
    }

    // Reconciling
    let summary = reconcile(store, &board.id, &batch).await?;
    run.counts.inserted = summary.inserted;
    run.counts.updated = summary.updated;
    run.counts.unchanged += summary.unchanged;

    // Done
    let status = if run.counts.skipped > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Succeeded
    };
    let error = (!skip_reasons.is_empty()).then(|| skip_reasons.join("; "));
    run.finish(status, error);
    store.record_run(run).await?;

    log::info!(
        "Board '{}' run {:?}: {} discovered, {} inserted, {} updated, {} unchanged, {} skipped",
        board.id,
        run.status,
        run.counts.discovered,
        run.counts.inserted,
        run.counts.updated,
        run.counts.unchanged,
        run.counts.skipped
    );

    Ok(())
}

/// Paginate the list view up to the caps.
///
/// Stops on the page cap, the item cap, or a page that adds no new
/// links versus what has been seen; boards with an unreliable "next
/// page" often serve the same page forever. Only a page-1 failure is
/// `BoardUnreachable`; a later page failure ends listing with what was
/// gathered.
async fn collect_list_items(
    config: &Config,
    fetcher: &dyn PageFetcher,
    extractor: &Extractor<'_>,
    board: &Board,
    delay: Duration,
) -> Result<Vec<ListItem>> {
    let mut items: Vec<ListItem> = Vec::new();
    let mut seen_links: HashSet<String> = HashSet::new();

    for page in 1..=config.limits.page_cap {
        let url = board.list_url(page);
        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(error) if page == 1 => {
                return Err(AppError::unreachable(&board.id, error));
            }
            Err(error) => {
                log::warn!("Board '{}': page {} failed ({}), stopping", board.id, page, error);
                break;
            }
        };

        let mut new_links = 0;
        for item in extractor.extract_list(&html, &url) {
            if items.len() >= config.limits.item_cap {
                break;
            }
            if seen_links.insert(item.link.clone()) {
                items.push(item);
                new_links += 1;
            }
        }

        if new_links == 0 || items.len() >= config.limits.item_cap || !board.is_paginated() {
            break;
        }

        if delay.as_millis() > 0 {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(items)
}

/// True when the store already holds this item and it is inside the
/// staleness window, so the detail page need not be fetched again.
async fn is_fresh(
    config: &Config,
    store: &dyn PostingStore,
    board: &Board,
    item: &ListItem,
) -> Result<bool> {
    if config.crawler.staleness_hours <= 0 {
        return Ok(false);
    }

    let fp = crate::models::fingerprint(&board.id, &item.locator);
    let Some(existing) = store.get_posting(&board.id, &fp).await? else {
        return Ok(false);
    };

    let age = chrono::Utc::now() - existing.updated_at;
    Ok(age < chrono::Duration::hours(config.crawler.staleness_hours))
}

/// Fetch a detail page, retrying once with backoff on a transient
/// failure.
async fn fetch_with_retry(
    config: &Config,
    fetcher: &dyn PageFetcher,
    url: &str,
    run: &mut CrawlRun,
) -> Result<String> {
    match fetcher.fetch(url).await {
        Ok(html) => Ok(html),
        Err(first) if first.is_transient() => {
            run.counts.retries += 1;
            log::debug!("Retrying detail fetch for {} after: {}", url, first);
            tokio::time::sleep(Duration::from_millis(config.crawler.detail_retry_delay_ms)).await;

            fetcher
                .fetch(url)
                .await
                .map_err(|second| AppError::detail_fetch(url, second))
        }
        Err(error) => Err(AppError::detail_fetch(url, error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttachmentRules, DetailRules, ExtractionProcedure, FieldRule, ListRules,
    };
    use crate::storage::MemoryStore;
    use crate::utils::http::testing::StaticFetcher;
    use chrono::NaiveDate;

    fn procedure() -> ExtractionProcedure {
        ExtractionProcedure {
            version: 1,
            list: ListRules {
                rows: vec!["tr:has(a)".to_string()],
                link: vec![FieldRule::attr("a", "href")],
                title: vec![FieldRule::text("a")],
                posted: vec![FieldRule::text("td.date")],
            },
            detail: DetailRules {
                title: vec![FieldRule::text("h1")],
                organization: vec![FieldRule::text(".org")],
                location: vec![FieldRule::text(".loc")],
                deadline: vec![FieldRule::text(".deadline")],
                body: vec![FieldRule::text(".content")],
            },
            attachments: AttachmentRules::default(),
            region_rules: Vec::new(),
        }
    }

    fn board() -> Board {
        Board {
            id: "b1".to_string(),
            name: "테스트 게시판".to_string(),
            url_template: "https://edu.example/list?page={page}".to_string(),
            active: true,
            region: None,
            procedure: Some(procedure()),
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.detail_retry_delay_ms = 0;
        config
    }

    fn list_page(rows: &[(&str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(seq, title)| {
                format!(
                    r#"<tr><td><a href="view?seq={seq}">{title}</a></td><td class="date">2025-10-20</td></tr>"#
                )
            })
            .collect();
        format!("<table>{body}</table>")
    }

    fn detail_page(title: &str, deadline: &str) -> String {
        format!(
            r#"<h1>{title}</h1>
               <div class="org">서울특별시교육청</div>
               <div class="loc">서울</div>
               <div class="deadline">{deadline}</div>
               <div class="content">모집 분야와 지원 방법을 안내하는 본문입니다.</div>"#
        )
    }

    fn three_item_fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with_page(
                "https://edu.example/list?page=1",
                list_page(&[("1", "공고 1"), ("2", "공고 2"), ("3", "공고 3")]),
            )
            .with_page(
                "https://edu.example/list?page=2",
                list_page(&[("1", "공고 1"), ("2", "공고 2"), ("3", "공고 3")]),
            )
            .with_page(
                "https://edu.example/view?seq=1",
                detail_page("공고 1", "2025-11-01"),
            )
            .with_page(
                "https://edu.example/view?seq=2",
                detail_page("공고 2", "2025-11-02"),
            )
            .with_page(
                "https://edu.example/view?seq=3",
                detail_page("공고 3", "2025-11-03"),
            )
    }

    #[tokio::test]
    async fn clean_run_inserts_everything() {
        let store = MemoryStore::new();
        let fetcher = three_item_fetcher();
        let mut run = CrawlRun::start("b1");

        crawl_board(&config(), &fetcher, &store, &board(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.counts.discovered, 3);
        assert_eq!(run.counts.inserted, 3);
        assert_eq!(run.counts.skipped, 0);
        assert!(run.is_terminal());
        assert_eq!(store.list_postings("b1").await.unwrap().len(), 3);

        // Identical second page stopped pagination at page 2.
        assert_eq!(fetcher.hits("https://edu.example/list?page=2"), 1);
        assert_eq!(fetcher.hits("https://edu.example/list?page=3"), 0);
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let store = MemoryStore::new();
        let fetcher = three_item_fetcher();

        let mut first = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut first)
            .await
            .unwrap();

        let mut second = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut second)
            .await
            .unwrap();

        assert_eq!(second.status, RunStatus::Succeeded);
        assert_eq!(second.counts.inserted, 0);
        assert_eq!(second.counts.updated, 0);
        assert_eq!(second.counts.unchanged, 3);
        assert_eq!(store.list_postings("b1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn retry_then_field_missing_yields_partial() {
        // 3 items; one detail fails once then succeeds on retry; one
        // has no extractable title.
        let store = MemoryStore::new();
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://edu.example/list?page=1",
                list_page(&[("1", "공고 1"), ("2", "공고 2"), ("3", "공고 3")]),
            )
            .with_page(
                "https://edu.example/view?seq=1",
                detail_page("공고 1", "2025-11-01"),
            )
            .with_page(
                "https://edu.example/view?seq=2",
                detail_page("공고 2", "2025-11-02"),
            )
            .with_page(
                "https://edu.example/view?seq=3",
                r#"<div class="content">제목 없이 본문만 있는 깨진 페이지입니다.</div>"#,
            )
            .failing("https://edu.example/view?seq=2", 1);

        let mut run = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.counts.discovered, 3);
        assert_eq!(run.counts.inserted, 2);
        assert_eq!(run.counts.skipped, 1);
        assert_eq!(run.counts.retries, 1);
        assert!(run.error.as_deref().unwrap().contains("title"));
        assert_eq!(fetcher.hits("https://edu.example/view?seq=2"), 2);
    }

    #[tokio::test]
    async fn detail_failing_twice_is_skipped() {
        let store = MemoryStore::new();
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://edu.example/list?page=1",
                list_page(&[("1", "공고 1")]),
            )
            .with_page(
                "https://edu.example/view?seq=1",
                detail_page("공고 1", "2025-11-01"),
            )
            .failing("https://edu.example/view?seq=1", 2);

        let mut run = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.counts.skipped, 1);
        assert_eq!(run.counts.retries, 1);
        assert_eq!(run.counts.inserted, 0);
    }

    #[tokio::test]
    async fn unreachable_list_page_fails_run() {
        let store = MemoryStore::new();
        let fetcher = StaticFetcher::new(); // serves nothing

        let mut run = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("unreachable"));
        assert_eq!(run.counts.discovered, 0);
        assert!(store.list_postings("b1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_deadline_recrawl_updates_one() {
        // One deadline moves 2025-11-01 -> 2025-11-15 between crawls.
        let store = MemoryStore::new();
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://edu.example/list?page=1",
                list_page(&[("1", "공고 1"), ("2", "공고 2")]),
            )
            .with_page(
                "https://edu.example/view?seq=1",
                detail_page("공고 1", "2025-11-01"),
            )
            .with_page(
                "https://edu.example/view?seq=2",
                detail_page("공고 2", "2025-11-02"),
            );

        let mut first = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut first)
            .await
            .unwrap();

        let fetcher = StaticFetcher::new()
            .with_page(
                "https://edu.example/list?page=1",
                list_page(&[("1", "공고 1"), ("2", "공고 2")]),
            )
            .with_page(
                "https://edu.example/view?seq=1",
                detail_page("공고 1", "2025-11-15"),
            )
            .with_page(
                "https://edu.example/view?seq=2",
                detail_page("공고 2", "2025-11-02"),
            );

        let mut second = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut second)
            .await
            .unwrap();

        assert_eq!(second.counts.inserted, 0);
        assert_eq!(second.counts.updated, 1);
        assert_eq!(second.counts.unchanged, 1);

        let postings = store.list_postings("b1").await.unwrap();
        assert!(postings
            .iter()
            .any(|p| p.deadline == NaiveDate::from_ymd_opt(2025, 11, 15)));
    }

    #[tokio::test]
    async fn fresh_postings_skip_detail_fetch() {
        let store = MemoryStore::new();
        let fetcher = three_item_fetcher();

        let mut first = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board(), &mut first)
            .await
            .unwrap();
        let hits_after_first = fetcher.hits("https://edu.example/view?seq=1");

        let mut config = config();
        config.crawler.staleness_hours = 24;

        let mut second = CrawlRun::start("b1");
        crawl_board(&config, &fetcher, &store, &board(), &mut second)
            .await
            .unwrap();

        assert_eq!(second.counts.unchanged, 3);
        assert_eq!(second.counts.inserted, 0);
        // No detail page was re-fetched inside the staleness window.
        assert_eq!(
            fetcher.hits("https://edu.example/view?seq=1"),
            hits_after_first
        );
    }

    #[tokio::test]
    async fn missing_procedure_fails_run() {
        let store = MemoryStore::new();
        let fetcher = StaticFetcher::new();
        let mut board = board();
        board.procedure = None;

        let mut run = CrawlRun::start("b1");
        crawl_board(&config(), &fetcher, &store, &board, &mut run)
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("procedure"));
    }

    #[tokio::test]
    async fn pagination_respects_page_cap() {
        // Every page serves fresh links; the cap must stop the walk.
        let mut pages = StaticFetcher::new();
        for page in 1..=10 {
            let seq_a = format!("{}a", page);
            let seq_b = format!("{}b", page);
            pages = pages.with_page(
                format!("https://edu.example/list?page={page}"),
                list_page(&[(seq_a.as_str(), "공고"), (seq_b.as_str(), "공고")]),
            );
        }
        let fetcher = pages;

        let mut config = config();
        config.limits.page_cap = 3;

        let extractor_procedure = procedure();
        let extractor = Extractor::new(&extractor_procedure, &config.extraction);
        let items = collect_list_items(
            &config,
            &fetcher,
            &extractor,
            &board(),
            Duration::from_millis(0),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 6);
        assert_eq!(fetcher.hits("https://edu.example/list?page=4"), 0);
    }
}

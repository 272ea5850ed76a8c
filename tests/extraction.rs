//! Extraction properties over the fake DOM
//!
//! Runs the extraction engine against scripted pages: lazy-loaded lists,
//! duplicate cards, skeleton placeholders and results rendered in an iframe.

use std::collections::HashSet;

use jobflow::scrapers::testing::{FakeCard, FakeFrame, FakePage};
use jobflow::scrapers::{ExtractionConfig, ExtractionEngine, ListingQuery, StopReason};

const ITEM: &str = ".job-card-container";

fn engine() -> ExtractionEngine {
    ExtractionEngine::new(ExtractionConfig::default())
}

fn card(id: usize) -> FakeCard {
    FakeCard::listing(&id.to_string(), &format!("Engineer {}", id), "Acme")
}

#[tokio::test]
async fn duplicate_cards_yield_unique_listings() {
    // 20 cards, ids cycling over 8 values
    let cards = (0..20).map(|i| card(i % 8)).collect();
    let frame = FakeFrame::new(ITEM, cards).lazy(5, 5);
    let page = FakePage::with_results(frame);

    let report = engine()
        .extract(&page, &ListingQuery::new("engineer"), 8)
        .await
        .unwrap();

    assert_eq!(report.listings.len(), 8);
    assert_eq!(report.stop_reason, StopReason::TargetReached);
    let ids: HashSet<_> = report.listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn short_list_stops_after_stalled_scrolls() {
    let cards = (1..=5).map(card).collect();
    let page = FakePage::single_frame(ITEM, cards);

    let report = engine()
        .extract(&page, &ListingQuery::new("engineer"), 50)
        .await
        .unwrap();

    assert_eq!(report.listings.len(), 5);
    assert_eq!(report.stop_reason, StopReason::Stalled);
    assert!(report.scroll_steps <= 3);
    assert!(page.scroll_count() <= 3);
}

#[tokio::test]
async fn stall_bound_applies_after_cards_stop_appearing() {
    // One card per scroll with only two attached at a time
    let cards = (1..=5).map(card).collect();
    let frame = FakeFrame::new(ITEM, cards).lazy(1, 1).recycling(2);
    let page = FakePage::with_results(frame);

    let report = engine()
        .extract(&page, &ListingQuery::new("engineer"), 50)
        .await
        .unwrap();

    let ids: Vec<_> = report.listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(report.stop_reason, StopReason::Stalled);
    // four productive scrolls, then three without anything new
    assert_eq!(report.scroll_steps, 7);
}

#[tokio::test]
async fn target_is_never_exceeded() {
    let cards = (1..=30).map(card).collect();
    let frame = FakeFrame::new(ITEM, cards).lazy(10, 10);
    let page = FakePage::with_results(frame);

    let report = engine()
        .extract(&page, &ListingQuery::new("engineer"), 12)
        .await
        .unwrap();

    assert_eq!(report.listings.len(), 12);
    let first: Vec<_> = report.listings.iter().take(3).map(|l| l.id.as_str()).collect();
    assert_eq!(first, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn placeholders_and_unrendered_cards_are_skipped() {
    let cards = vec![
        card(1),
        FakeCard::placeholder(),
        card(2),
        FakeCard::placeholder(),
        // id known but content not rendered yet
        FakeCard::new("3"),
        card(4),
    ];
    let page = FakePage::single_frame(ITEM, cards);

    let report = engine()
        .extract(&page, &ListingQuery::new("engineer"), 10)
        .await
        .unwrap();

    let ids: Vec<_> = report.listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "4"]);
    assert!(report.placeholders_skipped >= 2);
    for listing in &report.listings {
        assert_eq!(listing.company, "Acme");
        assert!(listing
            .url
            .starts_with("https://www.linkedin.com/jobs/view/"));
    }
}

#[tokio::test]
async fn results_inside_an_iframe_are_found() {
    let results = FakeFrame::new(ITEM, (1..=4).map(card).collect());
    let page = FakePage::new(vec![FakeFrame::search_form(), results]);

    let query = ListingQuery::new("rust developer").with_location("Berlin");
    let report = engine().extract(&page, &query, 4).await.unwrap();

    assert_eq!(report.listings.len(), 4);
    assert_eq!(report.stop_reason, StopReason::TargetReached);

    let typed: Vec<_> = page.typed().into_iter().map(|(_, text)| text).collect();
    assert_eq!(typed, vec!["rust developer", "Berlin"]);
    assert_eq!(page.keys(), vec!["Enter"]);
    assert_eq!(page.url().as_deref(), Some("https://www.linkedin.com/jobs/"));
}

#[tokio::test]
async fn no_results_is_not_an_error() {
    let mut config = ExtractionConfig::default();
    config.result_poll_attempts = 2;
    let page = FakePage::single_frame(ITEM, Vec::new());

    let report = ExtractionEngine::new(config)
        .extract(&page, &ListingQuery::new("unicorn wrangler"), 10)
        .await
        .unwrap();

    assert!(report.listings.is_empty());
    assert_eq!(report.stop_reason, StopReason::NoResults);
}

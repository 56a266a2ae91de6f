use crate::config::ExtractorConfig;
use crate::crawlers::Extractor;
use crate::crawlers::fetcher::MemoryFetcher;
use crate::error::ExtractError;
use crate::filter::UrlFilterConfig;
use crate::parsers::parse_document;
use crate::results::ElementRecord;
use crate::tree::ResultTree;

const HOME: &str = "https://site.test/";

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

fn chain_page(next: &str) -> String {
    format!("<h1>Page</h1><a class=\"next\" href=\"{}\">next</a>", next)
}

/// A -> B -> C -> D, each page linking to the next
fn chain() -> MemoryFetcher {
    MemoryFetcher::default()
        .with_page("https://site.test/b", &chain_page("/c"))
        .with_page("https://site.test/c", &chain_page("/d"))
        .with_page("https://site.test/d", &chain_page("/e"))
}

fn depth_of(records: &[ElementRecord]) -> usize {
    records
        .iter()
        .map(|r| 1 + depth_of(&r.children))
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_non_recursive_visits_only_current_page() {
    let page = parse_document(
        "<ul><li><a href=\"/b\">B</a></li><li><a href=\"/c\">C</a></li></ul>",
        HOME,
    );
    let extractor = Extractor::new(chain(), ExtractorConfig::default());
    let list = patterns(&["//a", "//li[2]"]);

    let records = extractor.extract(&list, &page, false).await.unwrap();

    assert_eq!(records.len(), 3);
    assert!(extractor.fetcher().hits().is_empty());
    assert!(records.iter().all(|r| list.contains(&r.pattern_used)));
    assert!(records.iter().all(|r| r.url == HOME && r.children.is_empty()));
    assert_eq!(records[0].href, "https://site.test/b");
    assert_eq!(records[2].tag_name, "LI");
}

#[tokio::test]
async fn test_shared_link_is_fetched_once() {
    let page = parse_document(
        "<a href=\"/b\">one</a><a href=\"/b#top\">two</a><a href=\"https://site.test/b\">three</a>",
        HOME,
    );
    let fetcher =
        MemoryFetcher::default().with_page("https://site.test/b", "<a name=\"end\">end</a>");
    let extractor = Extractor::new(fetcher, ExtractorConfig::default());

    let records = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await
        .unwrap();

    assert_eq!(extractor.fetcher().hits(), vec!["https://site.test/b"]);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].children.len(), 1);
    assert!(records[1].children.is_empty());
    assert!(records[2].children.is_empty());
}

#[tokio::test]
async fn test_depth_is_bounded() {
    let page = parse_document(&chain_page("/b"), HOME);
    let extractor = Extractor::new(chain(), ExtractorConfig::default());

    let records = extractor
        .extract(&patterns(&["//a[@class='next']"]), &page, true)
        .await
        .unwrap();

    assert_eq!(
        extractor.fetcher().hits(),
        vec!["https://site.test/b", "https://site.test/c"]
    );
    assert_eq!(depth_of(&records), 3);
    let from_b = &records[0].children[0];
    assert_eq!(from_b.url, "https://site.test/b");
    assert_eq!(from_b.href, "https://site.test/c");
    let from_c = &from_b.children[0];
    assert_eq!(from_c.url, "https://site.test/c");
    assert!(from_c.children.is_empty());
}

#[tokio::test]
async fn test_anchor_link_children_nest_in_tree() {
    let page = parse_document("<a href=\"/b#sec\">B</a>", HOME);
    let fetcher =
        MemoryFetcher::default().with_page("https://site.test/b", "<a href=\"#top\">Top</a>");
    let extractor = Extractor::new(fetcher, ExtractorConfig::default());

    let records = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await
        .unwrap();
    assert_eq!(records[0].href, "https://site.test/b#sec");
    assert_eq!(records[0].children.len(), 1);

    let mut tree = ResultTree::new();
    assert_eq!(tree.merge_all(records), 2);
    let saved = tree.to_records();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].children[0].text, "Top");
}

#[tokio::test]
async fn test_cycles_back_to_start_are_ignored() {
    let fetcher = MemoryFetcher::default().with_page("https://site.test/b", &chain_page("/"));
    let page = parse_document(&chain_page("/b"), HOME);
    let extractor = Extractor::new(fetcher, ExtractorConfig::default());

    let records = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await
        .unwrap();

    assert_eq!(extractor.fetcher().hits(), vec!["https://site.test/b"]);
    assert_eq!(records[0].children.len(), 1);
    assert!(records[0].children[0].children.is_empty());
}

#[tokio::test]
async fn test_failed_link_does_not_stop_siblings() {
    let page = parse_document(
        "<a href=\"/missing\">gone</a><a href=\"/b\">here</a>",
        HOME,
    );
    let config = ExtractorConfig {
        max_depth: 1,
        ..ExtractorConfig::default()
    };
    let extractor = Extractor::new(chain(), config);

    let records = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await
        .unwrap();

    assert_eq!(
        extractor.fetcher().hits(),
        vec!["https://site.test/missing", "https://site.test/b"]
    );
    assert!(records[0].children.is_empty());
    assert_eq!(records[1].children.len(), 1);
}

#[tokio::test]
async fn test_bad_pattern_is_skipped() {
    let page = parse_document("<a href=\"/b\">B</a>", HOME);
    let extractor = Extractor::new(chain(), ExtractorConfig::default());

    let records = extractor
        .extract(
            &patterns(&["//a[", "count(//a)", "  //a  "]),
            &page,
            false,
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pattern_used, "//a");
}

#[tokio::test]
async fn test_empty_pattern_list_fails_fast() {
    let page = parse_document("<a href=\"/b\">B</a>", HOME);
    let extractor = Extractor::new(chain(), ExtractorConfig::default());

    let result = extractor.extract(&patterns(&["", "   "]), &page, true).await;

    assert!(matches!(result, Err(ExtractError::EmptyPatterns)));
    assert!(extractor.fetcher().hits().is_empty());
}

#[tokio::test]
async fn test_filtered_links_are_not_followed() {
    let page = parse_document(
        "<a href=\"https://elsewhere.test/x\">away</a><a href=\"/report.pdf\">Report</a><a href=\"mailto:a@site.test\">mail</a>",
        HOME,
    );
    let config = ExtractorConfig {
        link_filter: UrlFilterConfig {
            allow_external: false,
            ..UrlFilterConfig::default()
        },
        ..ExtractorConfig::default()
    };
    let extractor = Extractor::new(chain(), config);

    let records = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await
        .unwrap();

    assert!(extractor.fetcher().hits().is_empty());
    assert_eq!(records.len(), 3);
    assert!(records[1].is_pdf);
}

#[tokio::test]
async fn test_cancelled_run_stops() {
    let page = parse_document(&chain_page("/b"), HOME);
    let extractor = Extractor::new(chain(), ExtractorConfig::default());
    extractor.cancellation_token().cancel();

    let result = extractor
        .extract(&patterns(&["//a"]), &page, true)
        .await;

    assert!(matches!(result, Err(ExtractError::Cancelled)));
    assert!(extractor.fetcher().hits().is_empty());
}

#[tokio::test]
async fn test_extract_url_fetches_start_page() {
    let extractor = Extractor::new(chain(), ExtractorConfig::default());

    let records = extractor
        .extract_url(&patterns(&["//h1"]), "https://site.test/b", false)
        .await
        .unwrap();
    assert_eq!(records[0].text, "Page");

    let missing = extractor
        .extract_url(&patterns(&["//h1"]), "https://site.test/zzz", false)
        .await;
    assert!(matches!(missing, Err(ExtractError::Fetch(_))));
}

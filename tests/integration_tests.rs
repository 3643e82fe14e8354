//! Integration Tests for the ingestion run
//!
//! Uses wiremock for the search, publisher, Gemini, CoinGecko and Supabase
//! endpoints.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finance_news_agent::extract::HtmlExtractor;
use finance_news_agent::http_client::SharedHttpClient;
use finance_news_agent::pipeline::{IngestionPipeline, NewsComponents, PipelineConfig, PriceOutcome};
use finance_news_agent::price::CoinGeckoPriceFeed;
use finance_news_agent::sources::BraveNewsSource;
use finance_news_agent::storage::{InsertOutcome, MemoryStore, NewsStore, SupabaseStore};
use finance_news_agent::schemas::{NewsItem, PricePoint};
use finance_news_agent::summarizer::GeminiSummarizer;

const SUMMARY: &str = "The Federal Reserve held rates steady at 5.25%, and equities \
rallied 1.2% as traders priced in two cuts before year end.";

fn http() -> Arc<SharedHttpClient> {
    Arc::new(SharedHttpClient::with_defaults().unwrap())
}

fn article_html(headline: &str) -> String {
    let paragraph = format!("<p>{} Markets moved sharply after the announcement.</p>", headline);
    format!(
        "<html><head><title>{h}</title></head><body>\
         <nav>Markets | Tech | Opinion</nav>\
         <article><h1>{h}</h1>{p}</article>\
         <footer>Copyright</footer></body></html>",
        h = headline,
        p = paragraph.repeat(15),
    )
}

fn gemini_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Search results pointing at article pages served by `server`
fn search_response(server: &MockServer, slugs: &[&str]) -> Value {
    let results: Vec<Value> = slugs
        .iter()
        .map(|slug| {
            json!({
                "title": format!("Story {}", slug),
                "url": format!("{}/markets/{}?utm_source=brave", server.uri(), slug),
                "description": "Markets update",
                "age": "2 hours ago"
            })
        })
        .collect();
    json!({ "type": "news", "results": results })
}

fn article_url(server: &MockServer, slug: &str) -> String {
    format!("{}/markets/{}", server.uri(), slug)
}

async fn mount_search(server: &MockServer, slugs: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/res/v1/news/search"))
        .and(header("X-Subscription-Token", "brave-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response(server, slugs)))
        .mount(server)
        .await;
}

async fn mount_article(server: &MockServer, slug: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/markets/{}", slug)))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                article_html(&format!("Story {}", slug)),
                "text/html; charset=utf-8",
            ),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_gemini(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/.+:generateContent$"))
        .and(header("x-goog-api-key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(SUMMARY)))
        .mount(server)
        .await;
}

async fn mount_price(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// One mock server plays every upstream; its host is the only allowed source
fn news_components(server: &MockServer, http: Arc<SharedHttpClient>) -> NewsComponents {
    let host = url::Url::parse(&server.uri()).unwrap().host_str().unwrap().to_string();

    NewsComponents {
        source: Arc::new(BraveNewsSource::new(
            http.clone(),
            "brave-key".to_string(),
            &server.uri(),
            vec![host],
            600,
        )),
        extractor: Arc::new(HtmlExtractor::new(http.clone(), 600, 200)),
        summarizer: Arc::new(GeminiSummarizer::new(
            http,
            "gemini-key".to_string(),
            &server.uri(),
            "gemini-1.5-flash",
            600,
        )),
    }
}

fn pipeline_config(max_articles: usize) -> PipelineConfig {
    PipelineConfig {
        queries: vec!["stock market news today".to_string()],
        max_articles,
        extract_concurrency: 1,
    }
}

#[tokio::test]
async fn test_full_run_with_one_extraction_failure() {
    let server = MockServer::start().await;
    mount_search(&server, &["fed-holds", "broken", "oil-rally"]).await;
    mount_article(&server, "fed-holds", 1).await;
    mount_article(&server, "oil-rally", 1).await;
    Mock::given(method("GET"))
        .and(path("/markets/broken"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_gemini(&server).await;
    mount_price(&server, json!({"bitcoin": {"usd": 67000.50}})).await;

    let http = http();
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestionPipeline::new(pipeline_config(3), store.clone())
        .with_news(news_components(&server, http.clone()))
        .with_price_feed(Arc::new(CoinGeckoPriceFeed::new(http, &server.uri(), None, 600)));

    let report = pipeline.run("integration").await;
    let news = report.news.as_ref().unwrap();

    assert_eq!(news.persisted.len(), 2);
    assert_eq!(news.failures.len(), 1);
    assert_eq!(news.failures[0].kind, "extraction_failed");
    assert_eq!(news.failures[0].url, article_url(&server, "broken"));

    let rows = store.news_rows();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.summary, SUMMARY);
        assert!(!row.url.contains("utm_source"));
        assert!(!row.summary.contains("Markets moved sharply"));
    }

    assert_eq!(report.price, Some(PriceOutcome::Stored { price: 67000.50 }));
    let prices = store.price_rows();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0].price, 67000.50);
    assert!(prices[0].created_at.is_some());
}

#[tokio::test]
async fn test_stored_url_is_never_extracted() {
    let server = MockServer::start().await;
    mount_search(&server, &["known", "fresh"]).await;
    mount_article(&server, "known", 0).await;
    mount_article(&server, "fresh", 1).await;
    mount_gemini(&server).await;

    let existing = NewsItem {
        title: "Story known".to_string(),
        url: article_url(&server, "known"),
        source: "127.0.0.1".to_string(),
        summary: SUMMARY.to_string(),
        created_at: chrono::Utc::now(),
    };
    let store = Arc::new(MemoryStore::with_news(vec![existing]));
    let pipeline = IngestionPipeline::new(pipeline_config(3), store.clone())
        .with_news(news_components(&server, http()));

    let report = pipeline.run("integration").await;
    let news = report.news.unwrap();

    assert_eq!(news.skipped_existing, 1);
    assert_eq!(news.persisted, vec![article_url(&server, "fresh")]);
    assert_eq!(store.news_rows().len(), 2);
}

#[tokio::test]
async fn test_repeated_runs_create_no_duplicates() {
    let server = MockServer::start().await;
    mount_search(&server, &["fed-holds", "oil-rally"]).await;
    mount_article(&server, "fed-holds", 1).await;
    mount_article(&server, "oil-rally", 1).await;
    mount_gemini(&server).await;

    let http = http();
    let store = Arc::new(MemoryStore::new());

    for run in ["first", "second"] {
        let pipeline = IngestionPipeline::new(pipeline_config(3), store.clone())
            .with_news(news_components(&server, http.clone()));
        pipeline.run(run).await;
    }

    assert_eq!(store.news_rows().len(), 2);
}

#[tokio::test]
async fn test_search_outage_still_records_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/res/v1/news/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    mount_price(&server, json!({"bitcoin": {"usd": 64321.0}})).await;

    let http = http();
    let store = Arc::new(MemoryStore::new());
    let mut config = pipeline_config(3);
    config.queries.push("federal reserve".to_string());

    let pipeline = IngestionPipeline::new(config, store.clone())
        .with_news(news_components(&server, http.clone()))
        .with_price_feed(Arc::new(CoinGeckoPriceFeed::new(http, &server.uri(), None, 600)));

    let report = pipeline.run("integration").await;

    let news = report.news.as_ref().unwrap();
    assert!(news.search_error.as_deref().unwrap().contains("503"));
    assert!(store.news_rows().is_empty());
    assert_eq!(store.price_rows().len(), 1);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_price_without_usd_is_not_stored() {
    let server = MockServer::start().await;
    mount_price(&server, json!({"bitcoin": {}})).await;

    let http = http();
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestionPipeline::new(pipeline_config(3), store.clone())
        .with_price_feed(Arc::new(CoinGeckoPriceFeed::new(http, &server.uri(), None, 600)));

    let report = pipeline.run("integration").await;

    assert!(matches!(report.price, Some(PriceOutcome::FetchFailed { .. })));
    assert!(store.price_rows().is_empty());
}

#[tokio::test]
async fn test_empty_model_response_skips_item() {
    let server = MockServer::start().await;
    mount_search(&server, &["fed-holds"]).await;
    mount_article(&server, "fed-holds", 1).await;
    Mock::given(method("POST"))
        .and(path_regex(r":generateContent$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response("   ")))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestionPipeline::new(pipeline_config(3), store.clone())
        .with_news(news_components(&server, http()));

    let report = pipeline.run("integration").await;
    let news = report.news.unwrap();

    assert_eq!(news.failures_of_kind("summarization_failed"), 1);
    assert!(store.news_rows().is_empty());
}

#[tokio::test]
async fn test_supabase_store_round_trip() {
    let server = MockServer::start().await;
    let known = "https://www.cnbc.com/2024/05/01/fed-holds.html";

    Mock::given(method("GET"))
        .and(path("/rest/v1/finance_news"))
        .and(query_param("url", format!("eq.{}", known)))
        .and(header("apikey", "service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/finance_news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/btc_price"))
        .and(header("authorization", "Bearer service-key"))
        .and(body_partial_json(json!({"price": 67000.5})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseStore::new(http(), &server.uri(), "service-key", 600);

    assert!(store.news_exists(known).await.unwrap());
    assert!(!store.news_exists("https://www.wsj.com/markets/other").await.unwrap());
    store.insert_price_point(&PricePoint::new(67000.50)).await.unwrap();
}

#[tokio::test]
async fn test_supabase_conflict_is_already_present() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/finance_news"))
        .and(body_partial_json(json!({"finance_info": SUMMARY})))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"finance_news_url_key\""
        })))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(http(), &server.uri(), "service-key", 600);
    let item = NewsItem {
        title: "Fed holds".to_string(),
        url: "https://www.cnbc.com/2024/05/01/fed-holds.html".to_string(),
        source: "cnbc.com".to_string(),
        summary: SUMMARY.to_string(),
        created_at: chrono::Utc::now(),
    };

    assert_eq!(store.insert_news_item(&item).await.unwrap(), InsertOutcome::AlreadyPresent);
}

#[tokio::test]
async fn test_supabase_server_error_is_write_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/btc_price"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(http(), &server.uri(), "service-key", 600);
    let err = store.insert_price_point(&PricePoint::new(1.0)).await.unwrap_err();

    assert_eq!(err.kind(), "storage_write_failed");
}

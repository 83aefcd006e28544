//! Integration tests for the crawl pipelines
//!
//! These tests use wiremock to stand in for the storefront and drive whole
//! pipelines end to end with the plain HTTP strategy and millisecond delays.

use catalog_sweep::config::{Config, DelayRange, PipelineKind, RetryConfig};
use catalog_sweep::crawler::{run_pipeline, CrawlContext, FetchStrategy, PipelineReport};
use catalog_sweep::extract::{CountRecord, DetailRecord, ProductRecord, SiteProfile};
use catalog_sweep::output::reconcile;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `out_dir`, with every delay shrunk
fn create_test_config(out_dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.page_delay_ms = DelayRange::ZERO;
    config.crawler.allowed_domains = vec!["127.0.0.1".to_string()];
    config.light.pre_request_delay_ms = DelayRange::ZERO;
    config.light.user_agents = vec!["TestAgent/1.0".to_string()];
    config.retry = RetryConfig {
        backoff_unit_ms: 1,
        max_delay_ms: 20,
        rate_limit_jitter_ms: DelayRange(1, 5),
        server_error_jitter_ms: DelayRange(1, 5),
        network_jitter_ms: DelayRange(1, 5),
        ..RetryConfig::default()
    };
    config.output.directory = out_dir.display().to_string();
    for pipeline in [
        &mut config.pipelines.products,
        &mut config.pipelines.catalog,
        &mut config.pipelines.count,
        &mut config.pipelines.details,
    ] {
        pipeline.strategy = Some(FetchStrategy::Light);
    }
    config
}

fn context(config: Config) -> CrawlContext {
    CrawlContext::new(config, SiteProfile::builtin().expect("built-in profile"))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = std::fs::read_to_string(path).expect("dataset written");
    serde_json::from_str(&text).expect("valid JSON")
}

const LISTING_CARDS: &str = r#"
<div class="grid">
  <div class="grid-product">
    <a href="/products/heartleaf-toner-pad"><img data-src="//cdn.example/toner.jpg"></a>
    <div class="grid-product__title">Heartleaf Toner Pad</div>
    <div class="grid-product__price">  $32.00
        NZD </div>
  </div>
  <div class="grid-product">
    <a href="/products/no-title"></a>
  </div>
  <div class="grid-product">
    <a href="/products/acne-foam"></a>
    <h3>Acne Foam Cleanser</h3>
  </div>
</div>"#;

async fn run_products(server: &MockServer, dir: &TempDir) -> PipelineReport {
    let mut config = create_test_config(dir.path());
    config.pipelines.products.start_urls = Some(vec![format!("{}/collections/abib", server.uri())]);
    run_pipeline(&context(config), PipelineKind::Products)
        .await
        .expect("pipeline runs")
}

#[tokio::test]
async fn test_listing_without_pagination_ends_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(html(LISTING_CARDS))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    let records: Vec<ProductRecord> = read_json(report.output.as_ref().expect("output written"));
    assert_eq!(records.len(), 2);

    let toner = records
        .iter()
        .find(|r| r.title == "Heartleaf Toner Pad")
        .expect("toner record");
    assert_eq!(toner.price.as_deref(), Some("$32.00 NZD"));
    assert_eq!(toner.brand, "Abib");
    assert_eq!(toner.image.as_deref(), Some("http://cdn.example/toner.jpg"));
    assert_eq!(
        toner.link.as_deref(),
        Some(format!("{}/products/heartleaf-toner-pad", server.uri()).as_str())
    );
    assert_eq!(toner.source_url, format!("{}/collections/abib", server.uri()));

    assert!(records.iter().any(|r| r.title == "Acne Foam Cleanser"));
    assert_eq!(report.stats.pages_fetched, 1);
}

#[tokio::test]
async fn test_rate_limited_page_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(html(LISTING_CARDS))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    assert_eq!(report.stats.retries, 1);
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.stats.records, 2);
}

#[tokio::test]
async fn test_five_rate_limits_abandon_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    assert_eq!(report.stats.records, 0);
    assert_eq!(report.stats.pages_abandoned, 1);
    assert_eq!(report.stats.retries, 4);
    assert!(report.output.is_none());
    assert!(!dir.path().join("abib_products.json").exists());
}

#[tokio::test]
async fn test_server_error_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(html(LISTING_CARDS))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    assert_eq!(report.stats.retries, 2);
    assert_eq!(report.stats.records, 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    assert_eq!(report.stats.pages_abandoned, 1);
    assert_eq!(report.stats.retries, 0);
    assert!(report.output.is_none());
}

#[tokio::test]
async fn test_pagination_loop_terminates() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/collections/abib"))
        .respond_with(html(&format!(
            r#"{}<span class="next"><a href="/collections/abib/page/2">Next</a></span>"#,
            LISTING_CARDS
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/abib/page/2"))
        .respond_with(html(&format!(
            r#"<div class="grid-product"><h3>Page Two Serum</h3></div>
               <a rel="next" href="{}/collections/abib/">Back</a>"#,
            base
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = run_products(&server, &dir).await;

    let records: Vec<ProductRecord> = read_json(report.output.as_ref().unwrap());
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|r| r.title == "Page Two Serum"
        && r.source_url == format!("{}/collections/abib/page/2", base)));
    assert_eq!(report.stats.urls_already_seen, 1);
}

const BRAND_INDEX: &str = r#"
<div class="main-content"><div class="table-wrapper"><table><tr>
  <td><a href="/collections/abib">Abib</a></td>
  <td><a href="/collections/anua">Anua</a></td>
  <td><a href="https://elsewhere.example/collections/x">Elsewhere</a></td>
</tr></table></div></div>"#;

fn collection(count: u64, products: &[&str], next: Option<&str>) -> String {
    let items: String = products
        .iter()
        .map(|p| {
            format!(
                r#"<div class="grid-item"><div class="grid-item__content"><a class="grid-item__link" href="/products/{}">{}</a></div></div>"#,
                p, p
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<span class="next"><a href="{}">Next</a></span>"#, href))
        .unwrap_or_default();
    format!(
        r#"<div class="collection-filter__item collection-filter__item--count small--hide">{} products</div>
           <div class="new-grid product-grid collection-grid">{}</div>{}"#,
        count, items, next
    )
}

fn product_page(name: &str, price: &str) -> String {
    format!(
        r#"<h1 class="h1 product-single__title">{}</h1>
           <div class="product__price"><span class="visually-hidden">{}</span></div>
           <div class="collapsible-content__inner rte"><span class="metafield-multi_line_text_field">Water, Glycerin</span></div>"#,
        name, price
    )
}

async fn mount_storefront(server: &MockServer) {
    let pages = [
        ("/pages/brand", BRAND_INDEX.to_string()),
        (
            "/collections/abib",
            collection(3, &["toner", "foam"], Some("/collections/abib/page/2")),
        ),
        ("/collections/abib/page/2", collection(3, &["serum"], None)),
        ("/collections/anua", collection(2, &["oil", "toner"], None)),
        ("/products/toner", product_page("Heartleaf Toner", "$32.00")),
        ("/products/foam", product_page("Acne Foam", "$28.00")),
        ("/products/serum", product_page("Jericho Serum", "$45.00")),
        ("/products/oil", product_page("Cleansing Oil", "$30.00")),
    ];
    for (route, body) in pages {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(&body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_catalog_count_and_reconcile() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    let index = vec![format!("{}/pages/brand", server.uri())];
    config.pipelines.catalog.start_urls = Some(index.clone());
    config.pipelines.count.start_urls = Some(index);
    let ctx = context(config);

    let (catalog, count) = tokio::join!(
        run_pipeline(&ctx, PipelineKind::Catalog),
        run_pipeline(&ctx, PipelineKind::Count)
    );
    let catalog = catalog.expect("catalog runs");
    let count = count.expect("count runs");

    let details: Vec<DetailRecord> = read_json(catalog.output.as_ref().unwrap());
    let mut names: Vec<&str> = details.iter().map(|d| d.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec!["Acne Foam", "Cleansing Oil", "Heartleaf Toner", "Jericho Serum"]
    );
    let toner = details.iter().find(|d| d.name == "Heartleaf Toner").unwrap();
    assert_eq!(toner.link, format!("{}/products/toner", server.uri()));
    assert_eq!(toner.price.as_deref(), Some("$32.00"));
    assert_eq!(toner.ingredients.as_deref(), Some("Water, Glycerin"));
    assert_eq!(catalog.stats.urls_off_domain, 1);

    let totals: Vec<CountRecord> = read_json(count.output.as_ref().unwrap());
    assert_eq!(totals.len(), 2);
    assert_eq!(totals.iter().map(|t| t.total_products).sum::<u64>(), 5);

    let report = reconcile(
        count.output.as_ref().unwrap(),
        catalog.output.as_ref().unwrap(),
    )
    .unwrap();
    assert_eq!(report.expected, 5);
    assert_eq!(report.scraped, 4);
    assert_eq!(report.missing(), 1);
}

#[tokio::test]
async fn test_details_pass_reads_link_file() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let dir = TempDir::new().unwrap();
    let links = serde_json::json!([
        { "link": format!("{}/products/toner", server.uri()), "name": "ignored" },
        { "link": format!("{}/products/missing", server.uri()) },
        { "link": "not a url" },
    ]);
    std::fs::write(dir.path().join("links.json"), links.to_string()).unwrap();

    let mut config = create_test_config(dir.path());
    config.pipelines.details.links_file = Some("links.json".to_string());
    let report = run_pipeline(&context(config), PipelineKind::Details)
        .await
        .expect("details pass runs");

    let details: Vec<DetailRecord> = read_json(report.output.as_ref().unwrap());
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].name, "Heartleaf Toner");
    assert_eq!(report.stats.pages_abandoned, 1);
    assert!(dir.path().join("product_details.json").exists());
}

#[tokio::test]
async fn test_details_pass_without_link_file_fails_setup() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.pipelines.details.links_file = Some("absent.json".to_string());

    assert!(run_pipeline(&context(config), PipelineKind::Details)
        .await
        .is_err());
}

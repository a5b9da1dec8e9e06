// Two-phase harvest runner.
//
// No CLI surface: the run configuration is source-level, edited here and
// rebuilt. Exit code 0 means both phases reached natural quiescence.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use propharvest::{
    run_harvest, CategorySpec, HarvestConfig, HarvestConfigBuilder, Intent, ProxyAuthMode,
    ProxyRecord, Segment, SinkConfig,
};

fn build_config() -> Result<HarvestConfig> {
    // Edit before a run: category depth, proxy inventory, sink endpoints.
    let proxies = vec![
        ProxyRecord::with_credentials("203.0.113.10:8000", "harvest", "changeme"),
        ProxyRecord::with_credentials("203.0.113.11:8000", "harvest", "changeme"),
        ProxyRecord::with_credentials("203.0.113.12:8000", "harvest", "changeme"),
        ProxyRecord::with_credentials("203.0.113.13:8000", "harvest", "changeme"),
        ProxyRecord::with_credentials("203.0.113.14:8000", "harvest", "changeme"),
    ];

    let sink = SinkConfig {
        event_url: None,
        dashboard_url: None,
        upload_url: None,
    };

    let config = HarvestConfigBuilder::new()
        .categories([
            CategorySpec::new(Intent::Sale, Segment::Residential, 2000),
            CategorySpec::new(Intent::Rent, Segment::Residential, 2000),
            CategorySpec::new(Intent::Sale, Segment::Commercial, 400),
            CategorySpec::new(Intent::Rent, Segment::Commercial, 400),
        ])
        .proxies(proxies)
        .proxy_auth(ProxyAuthMode::Extension)
        .workers(5, 5)
        .sink(sink)
        .output_root("harvest_runs")
        .build()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("propharvest=info")),
        )
        .init();

    let config = build_config()?;
    let summary = run_harvest(config).await?;

    tracing::info!(
        listings = summary.listing_count,
        details = summary.detail_count,
        adlist_exhausted = summary.adlist.final_exhausted,
        adview_exhausted = summary.adview.final_exhausted,
        complete = summary.is_complete(),
        "harvest finished"
    );
    println!(
        "ADLIST: {} listings ({} pages ok, {} exhausted) -> {}",
        summary.listing_count,
        summary.adlist.ok,
        summary.adlist.final_exhausted,
        summary.adlist_csv.display()
    );
    println!(
        "ADVIEW: {} rows ({} ok, {} exhausted) -> {}",
        summary.detail_count,
        summary.adview.ok,
        summary.adview.final_exhausted,
        summary.adview_csv.display()
    );
    Ok(())
}

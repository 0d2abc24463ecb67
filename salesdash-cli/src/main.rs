//! salesdash: terminal view of the sales-intelligence dashboard
//!
//! Talks to the dashboard REST API through `salesdash-core` and prints the
//! KPIs, tables and charts the dashboard shows, as text or `--json`.
//!
//! # Subcommands
//! - `kpis`: overview counters, funnel and conversion
//! - `clients [--seller] [--date-range] [--segment]`: client table with latest call
//! - `sellers`: seller leaderboard
//! - `heatmap`: urgency × budget conversion grid
//! - `use-cases [--status]`, `pains`, `origins`, `sentiment`, `automatization`
//! - `ingest <file>`: upload a CSV of leads

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use salesdash_core::aggregate::{
    format_delta, format_percent, heatmap_grid, latest_transcript, monthly_kpi,
    origin_shares, rank_sellers, seller_options, sentiment_label, total_conversion,
    transcript_status, HeatmapRow, RankedSeller, TranscriptStatus,
};
use salesdash_core::models::{
    Client, ConversionMetrics, MetricsFunnel, MetricsOverview,
};
use salesdash_core::{
    ClientsView, DateRange, Dashboard, FilterSelection, FilterStore,
    IngestNotice, SalesdashConfig, UseCaseStatus, ViewUpdate, ALL,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG: &str = "salesdash.toml";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "salesdash",
    version,
    about = "Sales-intelligence dashboard in the terminal"
)]
struct Cli {
    /// Configuration file (optional; SALESDASH__* env vars apply on top)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Dashboard API URL (overrides api.base_url)
    #[arg(long, env = "SALESDASH_API_URL")]
    server: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Overview counters, funnel stages and conversion rate
    Kpis,

    /// Clients with their latest call
    Clients {
        /// Restrict to one seller ("all" for everyone)
        #[arg(long, default_value = ALL)]
        seller: String,

        /// all, 7d, 30d or 90d
        #[arg(long, default_value = "30d")]
        date_range: DateRange,

        /// Segment ("all" for every segment)
        #[arg(long, default_value = ALL)]
        segment: String,
    },

    /// Seller leaderboard by conversion
    Sellers,

    /// Conversion by urgency and budget tier
    Heatmap,

    /// Use-case distribution
    UseCases {
        /// all, closed or open
        #[arg(long, default_value = "all")]
        status: UseCaseStatus,
    },

    /// Most frequent pains
    Pains,

    /// Lead origins and their share
    Origins,

    /// Closed vs open by sentiment
    Sentiment,

    /// Closed vs open with and without automatization
    Automatization,

    /// Upload a CSV of leads
    Ingest {
        /// Path to the CSV file
        file: PathBuf,
    },
}

// ============================================================================
// Rendering
// ============================================================================

/// One line of the clients table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRow {
    pub id: i64,
    pub name: String,
    pub seller: Option<String>,
    pub last_meeting: Option<String>,
    pub status: TranscriptStatus,
    pub close_probability: Option<f64>,
}

pub fn client_rows(clients: &[Client]) -> Vec<ClientRow> {
    clients
        .iter()
        .map(|c| {
            let latest = latest_transcript(c);
            ClientRow {
                id: c.id,
                name: c.name.clone(),
                seller: latest.and_then(|t| t.assigned_seller.clone()),
                last_meeting: latest.and_then(|t| t.meeting_date.clone()),
                status: transcript_status(c),
                close_probability: latest
                    .and_then(|t| t.classification.as_ref())
                    .map(|k| k.close_probability),
            }
        })
        .collect()
}

fn status_label(status: TranscriptStatus) -> &'static str {
    match status {
        TranscriptStatus::Closed => "closed",
        TranscriptStatus::Open => "open",
    }
}

pub fn render_clients(rows: &[ClientRow]) -> String {
    let mut out = format!(
        "{:<6} {:<28} {:<16} {:<22} {:<7} {}\n",
        "ID", "Client", "Seller", "Last meeting", "Status", "Close prob."
    );
    for r in rows {
        out.push_str(&format!(
            "{:<6} {:<28} {:<16} {:<22} {:<7} {}\n",
            r.id,
            truncate(&r.name, 28),
            r.seller.as_deref().unwrap_or("-"),
            r.last_meeting.as_deref().unwrap_or("-"),
            status_label(r.status),
            r.close_probability
                .map(format_percent)
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

pub fn render_kpis(
    overview: &MetricsOverview,
    funnel: &MetricsFunnel,
    conversions: &ConversionMetrics,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total clients:       {}\n", overview.total_clients));
    out.push_str(&format!("Classified clients:  {}\n", overview.classified_clients));
    out.push_str(&format!("Open opportunities:  {}\n", overview.open_opportunities));
    out.push_str(&format!("Closed wins:         {}\n", overview.closed_wins));
    out.push_str(&format!(
        "Conversion:          {}\n",
        format_percent(total_conversion(&conversions.monthly))
    ));
    if let Some(kpi) = monthly_kpi(&conversions.monthly) {
        let delta = kpi
            .delta
            .map(|d| format!(" ({} vs previous month)", format_delta(d)))
            .unwrap_or_default();
        out.push_str(&format!(
            "Latest month:        {} {}{}\n",
            kpi.latest.month,
            format_percent(kpi.latest.conversion),
            delta
        ));
    }
    out.push_str("\nFunnel\n");
    for (stage, count) in funnel.stages() {
        out.push_str(&format!("  {:<12} {}\n", stage, count));
    }
    out
}

pub fn render_sellers(ranked: &[RankedSeller]) -> String {
    let mut out = String::new();
    for s in ranked {
        out.push_str(&format!(
            "{:>2}. {:<20} {:>6}  ({}/{})\n",
            s.rank,
            truncate(&s.seller, 20),
            format_percent(s.conversion),
            s.closed,
            s.total
        ));
    }
    out
}

pub fn render_heatmap(rows: &[HeatmapRow]) -> String {
    let mut out = format!("{:<14}", "Urgency");
    if let Some(first) = rows.first() {
        for cell in &first.cells {
            out.push_str(&format!(" {:>12}", cell.budget_tier));
        }
    }
    out.push('\n');
    for row in rows {
        out.push_str(&format!("{:<14}", row.label));
        for cell in &row.cells {
            let text = if cell.total == 0 {
                "-".to_string()
            } else {
                format!("{} ({})", format_percent(cell.conversion), cell.total)
            };
            out.push_str(&format!(" {:>12}", text));
        }
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn do_kpis(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let (overview, funnel, conversions) = tokio::try_join!(
        dashboard.overview(),
        dashboard.funnel(),
        dashboard.conversions()
    )?;

    if json {
        return print_json(&serde_json::json!({
            "overview": overview,
            "funnel": funnel,
            "total_conversion": total_conversion(&conversions.monthly),
            "monthly": monthly_kpi(&conversions.monthly),
        }));
    }
    print!("{}", render_kpis(&overview, &funnel, &conversions));
    Ok(())
}

async fn do_clients(
    dashboard: Arc<Dashboard>,
    selection: FilterSelection,
    json: bool,
) -> anyhow::Result<()> {
    let store = FilterStore::new(selection);
    let mut view = ClientsView::new(dashboard, &store);

    match view.refresh_latest().await {
        ViewUpdate::Failed(e) => return Err(e.into()),
        ViewUpdate::Applied | ViewUpdate::Superseded => {}
    }
    let Some(shown) = view.shown() else {
        anyhow::bail!("no clients loaded");
    };

    let rows = client_rows(&shown.data.items);
    if json {
        return print_json(&serde_json::json!({
            "filters": shown.filters,
            "total": shown.data.total,
            "sellers": seller_options(&shown.data.items),
            "items": rows,
        }));
    }

    if rows.is_empty() {
        eprintln!(
            "No clients for seller={} date_range={}",
            shown.filters.seller, shown.filters.date_range
        );
        return Ok(());
    }
    print!("{}", render_clients(&rows));
    println!(
        "\n{} of {} clients · sellers: {}",
        rows.len(),
        shown.data.total,
        seller_options(&shown.data.items).join(", ")
    );
    Ok(())
}

async fn do_sellers(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let response = dashboard.seller_conversion().await?;
    let ranked = rank_sellers(&response.items);
    if json {
        return print_json(&ranked);
    }
    if ranked.is_empty() {
        eprintln!("No seller data yet");
        return Ok(());
    }
    print!("{}", render_sellers(&ranked));
    Ok(())
}

async fn do_heatmap(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let heatmap = dashboard.urgency_budget().await?;
    let grid = heatmap_grid(&heatmap);
    if json {
        return print_json(&grid);
    }
    print!("{}", render_heatmap(&grid));
    Ok(())
}

async fn do_use_cases(
    dashboard: &Dashboard,
    status: UseCaseStatus,
    json: bool,
) -> anyhow::Result<()> {
    let dist = dashboard.use_cases(status).await?;
    if json {
        return print_json(&dist);
    }
    println!("Use cases ({})", status.as_str());
    for item in &dist.items {
        println!("  {:<32} {}", truncate(&item.use_case, 32), item.total);
    }
    Ok(())
}

async fn do_pains(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let dist = dashboard.pains().await?;
    if json {
        return print_json(&dist);
    }
    for item in &dist.items {
        println!("  {:<32} {}", truncate(&item.pain, 32), item.total);
    }
    Ok(())
}

async fn do_origins(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let dist = dashboard.origins().await?;
    let shares = origin_shares(&dist);
    if json {
        return print_json(&shares);
    }
    for s in &shares {
        println!(
            "  {:<24} {:>5}  {:>6}",
            truncate(&s.origin, 24),
            s.total,
            format_percent(s.share)
        );
    }
    Ok(())
}

async fn do_sentiment(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let series = dashboard.sentiment_conversion().await?;
    if json {
        return print_json(&series);
    }
    println!("{:<16} {:>7} {:>7}", "Sentiment", "Closed", "Open");
    for item in &series.items {
        println!(
            "{:<16} {:>7} {:>7}",
            sentiment_label(item.sentiment),
            item.closed,
            item.open
        );
    }
    Ok(())
}

async fn do_automatization(dashboard: &Dashboard, json: bool) -> anyhow::Result<()> {
    let series = dashboard.automatization_outcomes().await?;
    if json {
        return print_json(&series);
    }
    println!("{:<16} {:>7} {:>7}", "Automatization", "Closed", "Open");
    for item in &series.items {
        let label = if item.automatization { "Yes" } else { "No" };
        println!("{:<16} {:>7} {:>7}", label, item.closed, item.open);
    }
    Ok(())
}

async fn do_ingest(dashboard: &Dashboard, file: &Path, json: bool) -> anyhow::Result<()> {
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");

    let result = dashboard.ingest_csv(file_name, contents).await;
    let notice = IngestNotice::from_result(&result);

    if json {
        print_json(&notice)?;
    } else if notice.is_success() {
        println!("{}", notice.message);
    }
    if !notice.is_success() {
        anyhow::bail!("{}", notice.message);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.to_string_lossy();
    let mut config = SalesdashConfig::load(&config_path)
        .with_context(|| format!("invalid configuration in {}", config_path))?;
    if let Some(server) = cli.server {
        config.api.base_url = server;
    }

    init_tracing(&config.log.level);
    tracing::debug!(base_url = %config.api.base_url, "salesdash starting");

    let dashboard = Arc::new(Dashboard::from_config(&config)?);

    match cli.command {
        Commands::Kpis => do_kpis(&dashboard, cli.json).await,
        Commands::Clients {
            seller,
            date_range,
            segment,
        } => {
            let selection = FilterSelection {
                date_range,
                seller,
                segment,
            };
            do_clients(dashboard, selection, cli.json).await
        }
        Commands::Sellers => do_sellers(&dashboard, cli.json).await,
        Commands::Heatmap => do_heatmap(&dashboard, cli.json).await,
        Commands::UseCases { status } => do_use_cases(&dashboard, status, cli.json).await,
        Commands::Pains => do_pains(&dashboard, cli.json).await,
        Commands::Origins => do_origins(&dashboard, cli.json).await,
        Commands::Sentiment => do_sentiment(&dashboard, cli.json).await,
        Commands::Automatization => do_automatization(&dashboard, cli.json).await,
        Commands::Ingest { file } => do_ingest(&dashboard, &file, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("salesdash: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use salesdash_core::models::{
        Classification, MonthlyConversion, SellerConversionStat, Transcript, UrgencyBudgetCell,
        UrgencyBudgetHeatmap,
    };

    fn transcript(id: i64, seller: &str, date: &str, closed: bool) -> Transcript {
        Transcript {
            id,
            client_id: 1,
            assigned_seller: Some(seller.to_string()),
            meeting_date: Some(date.to_string()),
            closed,
            transcript: None,
            classification: None,
        }
    }

    fn client(transcripts: Vec<Transcript>) -> Client {
        Client {
            id: 1,
            name: "Acme Logistics".to_string(),
            email_hash: None,
            phone_hash: None,
            transcripts,
        }
    }

    // ========================================================================
    // TEST 1: client row follows the latest transcript
    // ========================================================================
    #[test]
    fn test_client_row_uses_latest_transcript() {
        let mut latest = transcript(2, "Juan", "2024-05-01", true);
        latest.classification = Some(Classification {
            close_probability: 0.75,
            ..Default::default()
        });
        let clients = vec![client(vec![
            transcript(1, "Sara", "2024-04-01", false),
            latest,
        ])];

        let rows = client_rows(&clients);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seller.as_deref(), Some("Juan"));
        assert_eq!(rows[0].last_meeting.as_deref(), Some("2024-05-01"));
        assert_eq!(rows[0].status, TranscriptStatus::Closed);
        assert_eq!(rows[0].close_probability, Some(0.75));
    }

    // ========================================================================
    // TEST 2: client without transcripts renders placeholders
    // ========================================================================
    #[test]
    fn test_client_without_transcripts() {
        let rows = client_rows(&[client(Vec::new())]);
        assert_eq!(rows[0].status, TranscriptStatus::Open);
        assert!(rows[0].seller.is_none());

        let table = render_clients(&rows);
        let line = table.lines().nth(1).unwrap();
        assert!(line.contains("Acme Logistics"));
        assert!(line.contains("open"));
        assert!(line.trim_end().ends_with('-'));
    }

    // ========================================================================
    // TEST 3: KPI block shows conversion and month-over-month delta
    // ========================================================================
    #[test]
    fn test_render_kpis() {
        let overview = MetricsOverview {
            total_clients: 12,
            classified_clients: 10,
            open_opportunities: 7,
            closed_wins: 5,
        };
        let conversions = ConversionMetrics {
            monthly: vec![
                MonthlyConversion {
                    month: "2024-01".to_string(),
                    closed: 1,
                    total: 5,
                    conversion: 0.2,
                },
                MonthlyConversion {
                    month: "2024-02".to_string(),
                    closed: 3,
                    total: 5,
                    conversion: 0.3,
                },
            ],
        };
        let out = render_kpis(&overview, &MetricsFunnel::default(), &conversions);

        assert!(out.contains("Total clients:       12"));
        assert!(out.contains("Conversion:          40%"));
        assert!(out.contains("2024-02 30% (+10.0 % vs previous month)"));
        assert!(out.contains("Funnel"));
    }

    // ========================================================================
    // TEST 4: KPI block without monthly data omits the latest-month line
    // ========================================================================
    #[test]
    fn test_render_kpis_empty_series() {
        let out = render_kpis(
            &MetricsOverview::default(),
            &MetricsFunnel::default(),
            &ConversionMetrics::default(),
        );
        assert!(out.contains("Conversion:          0%"));
        assert!(!out.contains("Latest month"));
    }

    // ========================================================================
    // TEST 5: leaderboard lines are ranked
    // ========================================================================
    #[test]
    fn test_render_sellers() {
        let ranked = rank_sellers(&[
            SellerConversionStat {
                seller: "Sara".to_string(),
                closed: 1,
                total: 4,
                conversion: 0.25,
            },
            SellerConversionStat {
                seller: "Juan".to_string(),
                closed: 3,
                total: 4,
                conversion: 0.75,
            },
        ]);
        let out = render_sellers(&ranked);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with(" 1. Juan"));
        assert!(lines[0].contains("75%"));
        assert!(lines[1].starts_with(" 2. Sara"));
    }

    // ========================================================================
    // TEST 6: heatmap prints every tier and marks empty cells
    // ========================================================================
    #[test]
    fn test_render_heatmap() {
        let grid = heatmap_grid(&UrgencyBudgetHeatmap {
            cells: vec![UrgencyBudgetCell {
                urgency: 3,
                budget_tier: "high".to_string(),
                total: 4,
                closed: 2,
                conversion: 0.5,
            }],
        });
        let out = render_heatmap(&grid);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("Low") && lines[0].contains("High"));
        assert!(lines[4].starts_with("Critical"));
        assert!(lines[4].contains("50% (4)"));
        assert!(lines[1].contains('-'));
    }

    // ========================================================================
    // TEST 7: long names are truncated on a char boundary
    // ========================================================================
    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Señor Ñandú Import", 6), "Señor…");
    }

    // ========================================================================
    // TEST 8: CLI parses filters and the global json flag
    // ========================================================================
    #[test]
    fn test_cli_parses_clients_filters() {
        let cli = Cli::try_parse_from([
            "salesdash",
            "clients",
            "--seller",
            "Sara",
            "--date-range",
            "7d",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Clients {
                seller,
                date_range,
                segment,
            } => {
                assert_eq!(seller, "Sara");
                assert_eq!(date_range, DateRange::Last7Days);
                assert_eq!(segment, ALL);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    // ========================================================================
    // TEST 9: unknown date range is rejected
    // ========================================================================
    #[test]
    fn test_cli_rejects_bad_date_range() {
        let parsed = Cli::try_parse_from(["salesdash", "clients", "--date-range", "1y"]);
        assert!(parsed.is_err());
    }
}

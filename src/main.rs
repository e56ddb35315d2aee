//! pagemill command line: one URL in, Markdown artifacts out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pagemill::config::CrawlConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pagemill",
    about = "Fetch web pages and mill them into clean Markdown",
    version
)]
struct Cli {
    /// URL to fetch
    url: String,

    /// Output directory for the mirrored Markdown tree
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Retries after the first attempt (0 = exactly one attempt)
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Override the User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Crawl same-host links breadth-first instead of fetching one page
    #[arg(long)]
    crawl: bool,

    /// Maximum crawl depth
    #[arg(long, default_value_t = 10)]
    max_depth: usize,

    /// Maximum pages per crawl run
    #[arg(long, default_value_t = 1000)]
    max_pages: usize,

    /// Politeness delay between fetches, in seconds
    #[arg(long, default_value_t = 0.5)]
    delay: f64,

    /// Concurrent fetch workers (1-8)
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Only follow documentation-looking links while crawling
    #[arg(long)]
    doc_filter: bool,

    /// Save the raw HTML snapshot next to each Markdown file
    #[arg(long)]
    save_html: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Directory of YAML parser templates
    #[arg(long)]
    templates: Option<PathBuf>,

    /// YAML routing rules file
    #[arg(long)]
    routing_rules: Option<PathBuf>,

    /// Newline-separated SSL-problematic domain suffixes
    #[arg(long)]
    ssl_domains: Option<PathBuf>,

    /// Allow the operator-assisted manual strategy as a last resort
    #[arg(long)]
    allow_manual: bool,

    /// Browser DevTools debug endpoint
    #[arg(long, default_value = "http://127.0.0.1:9222")]
    debug_endpoint: String,

    /// Command that (re)starts the browser debug session
    #[arg(long)]
    session_cmd: Option<String>,

    /// Skip the scroll-to-bottom pass in the headless strategy
    #[arg(long)]
    no_scroll: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut builder = CrawlConfig::builder()
        .timeout_secs(cli.timeout)
        .max_retries(cli.retries)
        .manual_enabled(cli.allow_manual)
        .debug_endpoint(cli.debug_endpoint)
        .session_recovery_cmd(cli.session_cmd)
        .scroll_to_bottom(!cli.no_scroll)
        .crawl_enabled(cli.crawl)
        .max_depth(cli.max_depth)
        .max_pages(cli.max_pages)
        .crawl_delay_secs(cli.delay)
        .workers(cli.workers)
        .doc_filter(cli.doc_filter)
        .save_raw_html(cli.save_html)
        .template_dir(cli.templates)
        .routing_rules_path(cli.routing_rules)
        .ssl_domains_path(cli.ssl_domains);
    if let Some(ua) = cli.user_agent {
        builder = builder.user_agent(ua);
    }
    let config = match builder.output_dir(cli.output).start_url(cli.url).build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match pagemill::run(config).await {
        Ok(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("failed to serialize summary: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                for output in &summary.outputs {
                    println!("{}", output.document_path.display());
                }
                if let Some(crawl) = &summary.crawl {
                    eprintln!(
                        "crawl: {}/{} pages, {} failed - {}",
                        crawl.pages_succeeded,
                        crawl.pages_attempted,
                        crawl.pages_failed,
                        crawl.status
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

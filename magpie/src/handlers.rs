use clap::ArgMatches;
use colored::Colorize;
use magpie_core::harvest::{execute_harvest, generate_harvest_summary, HarvestOptions};
use magpie_core::history::RunHistory;
use magpie_core::report::{
    gather_report_data, generate_json_report, generate_markdown_report, generate_text_report,
    save_report, ReportFormat,
};
use magpie_scraper::extract::IdExtractor;
use magpie_scraper::frontier::{ExistingFilePolicy, FrontierConfig};
use magpie_scraper::materialize::Materializer;
use magpie_scraper::pinterest::{pin_extractor, PinterestMaterializer, PinterestSource};
use magpie_scraper::render::RenderClient;
use magpie_scraper::scribd::{document_extractor, ScribdMaterializer, ScribdSource};
use magpie_scraper::store::ProcessedLedger;
use magpie_scraper::DiscoverySource;
use magpie_triage::pipeline::{run_triage, TriageOptions, TriageProgressCallback};
use magpie_triage::VisionClient;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush().unwrap();
    let mut response = String::new();
    io::stdin().read_line(&mut response).unwrap();
    response.trim().to_lowercase()
}

/// Expand a user-supplied data directory, resolving a leading tilde.
pub fn expand_data_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Matched files land next to the input by default.
pub fn default_matched_dir(input: &Path) -> PathBuf {
    input.join("matched")
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  MAGPIE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_path = args.get_one::<String>("PATH").unwrap();
    let force = args.get_flag("force");
    let data_dir = expand_data_dir(raw_path);
    let db_loc = data_dir.join("magpie.db");
    let db_path = db_loc.as_path();

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        data_dir.display().to_string().bright_white()
    );
    println!();

    // Check for existing installation
    if data_dir.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Data directory already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            data_dir.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Do you want to continue? [y/N]:");
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return;
        }
        println!("{} Proceeding", "→".yellow().bold());
        println!();
    }

    println!("{} Creating directory structure...", "→".blue());
    fs::create_dir_all(&data_dir).expect("Failed to create data directory");
    println!(
        "  {} {}",
        "✓".green(),
        data_dir.display().to_string().bright_white()
    );
    println!();

    // Handle existing database in force mode
    if force && RunHistory::exists(db_path) {
        println!(
            "{} Deleting existing database (force mode)",
            "→".yellow().bold()
        );
        RunHistory::drop(db_path);
        println!("{} Existing database removed", "✓".green().bold());
        println!();
    }

    // Database creation
    if RunHistory::exists(db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [Y/n]:");
        println!();

        if response == "n" || response == "no" {
            println!("{} Keeping existing database", "→".blue());
            println!();
        } else {
            RunHistory::drop(db_path);
            println!("{} Existing database removed", "✓".green().bold());
            println!();
        }
    }

    if !RunHistory::exists(db_path) {
        println!("{} Creating database...", "→".blue());
        RunHistory::new(db_path).expect("Failed to create database");
        println!(
            "{} Database initialized: {}",
            "✓".green().bold(),
            db_path.display().to_string().bright_white()
        );
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Data directory: {}",
        "✓".green().bold(),
        data_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
}

// Shared argument bundle for the pins and docs subcommands
struct HarvestCliArgs {
    query: String,
    count: usize,
    related: usize,
    render_url: String,
    token: Option<String>,
    out_dir: PathBuf,
    data_dir: PathBuf,
    overfetch: usize,
    timeout: u64,
    ignore_existing: bool,
    no_history: bool,
    report: Option<PathBuf>,
    format: ReportFormat,
}

fn parse_harvest_args(args: &ArgMatches, default_out: &str) -> HarvestCliArgs {
    let format_str = args.get_one::<String>("format").unwrap();
    HarvestCliArgs {
        query: args.get_one::<String>("QUERY").unwrap().clone(),
        count: *args.get_one::<usize>("count").unwrap(),
        // Only the pins subcommand defines --related
        related: args
            .try_get_one::<usize>("related")
            .ok()
            .flatten()
            .copied()
            .unwrap_or(0),
        render_url: args.get_one::<String>("render").unwrap().clone(),
        token: args.get_one::<String>("token").cloned(),
        out_dir: args
            .get_one::<PathBuf>("out")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(default_out)),
        data_dir: expand_data_dir(args.get_one::<String>("data").unwrap()),
        overfetch: *args.get_one::<usize>("overfetch").unwrap(),
        timeout: *args.get_one::<u64>("timeout").unwrap(),
        ignore_existing: args.get_flag("ignore-existing"),
        no_history: args.get_flag("no-history"),
        report: args.get_one::<PathBuf>("report").cloned(),
        format: ReportFormat::from_str(format_str).unwrap_or(ReportFormat::Text),
    }
}

fn build_render_client(cli: &HarvestCliArgs) -> Arc<RenderClient> {
    let mut render = RenderClient::with_timeout(&cli.render_url, cli.timeout);
    if let Some(ref token) = cli.token {
        render = render.with_token(token);
    }
    Arc::new(render)
}

pub async fn handle_pins(args: &ArgMatches, quiet: bool) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let cli = parse_harvest_args(args, "./downloads/pins");
    let render = build_render_client(&cli);

    let source = Arc::new(PinterestSource::new(render.clone()));
    let materializer = Arc::new(PinterestMaterializer::new(render, cli.out_dir.clone()));

    run_harvest(
        "pinterest",
        cli,
        source,
        materializer,
        pin_extractor(),
        "processed_pins.json",
        quiet,
    )
    .await;
}

pub async fn handle_docs(args: &ArgMatches, quiet: bool) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let cli = parse_harvest_args(args, "./downloads/docs");
    let render = build_render_client(&cli);

    let source = Arc::new(ScribdSource::new(render.clone()));
    let materializer = Arc::new(ScribdMaterializer::new(
        render,
        cli.out_dir.clone(),
        &cli.query,
    ));

    run_harvest(
        "scribd",
        cli,
        source,
        materializer,
        document_extractor(),
        "processed_docs.json",
        quiet,
    )
    .await;
}

async fn run_harvest(
    site: &str,
    cli: HarvestCliArgs,
    source: Arc<dyn DiscoverySource>,
    materializer: Arc<dyn Materializer>,
    extractor: IdExtractor,
    ledger_file: &str,
    quiet: bool,
) {
    if let Err(e) = fs::create_dir_all(&cli.out_dir) {
        eprintln!("✗ Failed to create output directory: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = fs::create_dir_all(&cli.data_dir) {
        eprintln!("✗ Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    let ledger = ProcessedLedger::load(cli.data_dir.join(ledger_file));

    let history = if cli.no_history {
        None
    } else {
        match RunHistory::new(&cli.data_dir.join("magpie.db")) {
            Ok(db) => Some(db),
            Err(e) => {
                eprintln!("✗ Failed to open history database: {}", e);
                std::process::exit(1);
            }
        }
    };

    if !quiet {
        println!("\n🔎 Harvesting {} for '{}'", site, cli.query);
        println!("Target: {} new items", cli.count);
        if cli.related > 0 {
            println!("Related per item: {}", cli.related);
        }
        println!("Output: {}", cli.out_dir.display());
        println!("Already processed: {}\n", ledger.len());
    }

    let options = HarvestOptions {
        site: site.to_string(),
        query: cli.query.clone(),
        count: cli.count,
        related_per_item: cli.related,
        config: FrontierConfig {
            overfetch_factor: cli.overfetch,
            existing_file_policy: if cli.ignore_existing {
                ExistingFilePolicy::Ignore
            } else {
                ExistingFilePolicy::Authoritative
            },
            ..FrontierConfig::default()
        },
        show_progress_bars: !quiet,
    };

    let summary = match execute_harvest(
        options,
        source,
        materializer,
        extractor,
        ledger,
        history.as_ref(),
        None,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("✗ Harvest failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n✓ Harvest complete!\n");
    print!("{}", generate_harvest_summary(&summary));

    if let Some(ref report_path) = cli.report {
        let Some(ref db) = history else {
            eprintln!("✗ --report requires run history (remove --no-history)");
            std::process::exit(1);
        };
        let run = match db.recent_runs(1) {
            Ok(mut runs) if !runs.is_empty() => runs.remove(0),
            Ok(_) => {
                eprintln!("✗ No run recorded, cannot build a report");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("✗ Failed to query run history: {}", e);
                std::process::exit(1);
            }
        };
        let data = match gather_report_data(db, &run.id) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("✗ Failed to gather report data: {}", e);
                std::process::exit(1);
            }
        };
        let content = match cli.format {
            ReportFormat::Text => generate_text_report(&data),
            ReportFormat::Markdown => generate_markdown_report(&data),
            ReportFormat::Json => match generate_json_report(&data) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("✗ Failed to serialize report: {}", e);
                    std::process::exit(1);
                }
            },
        };
        if let Err(e) = save_report(&content, report_path) {
            eprintln!("✗ Failed to save report: {}", e);
            std::process::exit(1);
        }
        println!("\n✓ Report saved to {}", report_path.display());
    }
}

pub async fn handle_triage(args: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let input = args.get_one::<PathBuf>("input").unwrap().clone();
    let matched = args
        .get_one::<PathBuf>("matched")
        .cloned()
        .unwrap_or_else(|| default_matched_dir(&input));
    let endpoint = args.get_one::<String>("endpoint").unwrap();
    let model = args.get_one::<String>("model").unwrap();

    let mut client = VisionClient::new(endpoint).with_model(model);
    if let Some(prompt) = args.get_one::<String>("prompt") {
        client = client.with_prompt(prompt);
    }

    if !client.is_available().await {
        eprintln!("✗ Model endpoint {} is not reachable", endpoint);
        std::process::exit(1);
    }

    println!("\n🔍 Triaging {} with {}", input.display(), model);
    println!("Matches go to: {}\n", matched.display());

    let options = TriageOptions {
        input_dir: input,
        matched_dir: matched.clone(),
    };
    let progress_callback: TriageProgressCallback = Arc::new(|msg: String| {
        println!("  {}", msg);
    });

    match run_triage(&options, &client, Some(progress_callback)).await {
        Ok(summary) => {
            println!("\n✓ Triage complete!\n");
            println!("  Examined:  {}", summary.examined);
            println!("  Matched:   {}", summary.matched);
            println!("  Unmatched: {}", summary.unmatched);
            if summary.undecided > 0 {
                println!("  Undecided: {} (no extractable text)", summary.undecided);
            }
            if summary.failed > 0 {
                println!("  Failed:    {}", summary.failed);
            }
        }
        Err(e) => {
            eprintln!("✗ Triage failed: {}", e);
            std::process::exit(1);
        }
    }
}

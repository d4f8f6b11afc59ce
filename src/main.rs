use anyhow::Result;
use clap::Parser;
use implementor_discovery::cache::ArtifactCache;
use implementor_discovery::cli::{Cli, Commands, OutputFormat, RunArgs};
use implementor_discovery::config::{apply_run_args, clear_cache, resolve_config};
use implementor_discovery::discovery::{DiscoveryReport, DiscoveryService};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.clone() {
        Commands::Run(args) => run(&cli, &args)?,
        Commands::Show { interface } => {
            let config = resolve_config(&cli)?;
            let cache = ArtifactCache::new(&config.cache_path, config.artifact_format);
            let classes = cache.load(&interface)?;
            println!("{}", serde_json::to_string_pretty(&classes)?);
        }
        Commands::Profile { memory_limit } => {
            let mut config = resolve_config(&cli)?;
            if memory_limit.is_some() {
                config.memory_limit = memory_limit;
            }
            println!(
                "{}",
                serde_json::to_string_pretty(config.resource_profile())?
            );
        }
        Commands::Clear => {
            let config = resolve_config(&cli)?;
            clear_cache(&config.cache_path)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = resolve_config(cli)?;
    apply_run_args(&mut config, args);

    let report = DiscoveryService::new(&config).discover_all()?;
    let content = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text => render_text(&report),
    };
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn render_text(report: &DiscoveryReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("status: {:?}\n", report.status));
    out.push_str(&format!("files_found: {}\n", report.files_found));
    if let Some(stats) = &report.stats {
        out.push_str(&format!(
            "mode: {:?}, batches: {}, parsed: {}, skipped: {}\n",
            stats.mode, stats.batches, stats.parsed, stats.skipped
        ));
    }
    out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
    for summary in &report.interfaces {
        out.push_str(&format!(
            "- {}: {} -> {}\n",
            summary.interface, summary.implementors, summary.artifact
        ));
    }
    out
}

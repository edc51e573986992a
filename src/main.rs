use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use funnel_dedup::loader::DatasetLoader;
use funnel_dedup::models::DataSourceMode;
use funnel_dedup::{deduplicate, logging, report, Config, Dataset, DedupOutcome};
use std::path::Path;

enum Source {
    File(String),
    Url(String),
}

impl Source {
    fn location(&self) -> &str {
        match self {
            Source::File(path) => path,
            Source::Url(url) => url,
        }
    }

    /// Directory name for this source's results.
    fn output_name(&self, index: usize) -> String {
        let stem = self
            .location()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|last| Path::new(last).file_stem())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("source_{}", index + 1));
        stem.replace(' ', "_").replace(['?', '&', '='], "_")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let matches = Command::new("funnel-dedup")
        .version("0.1")
        .about("Removes duplicate applicant records, keeping the furthest funnel stage")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Input CSV or HTML file (overrides configured sources)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory (overrides configuration)"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please edit {} and point it at your data, then run the program again.", config_file);
        return Ok(());
    };

    let sources: Vec<Source> = match matches.get_many::<String>("input") {
        Some(inputs) => inputs.cloned().map(Source::File).collect(),
        None => configured_sources(&config),
    };

    if sources.is_empty() {
        println!("❌ No input sources configured");
        return Ok(());
    }

    let output_dir = matches
        .get_one::<String>("output")
        .cloned()
        .or_else(|| config.output_directory.clone())
        .unwrap_or_else(|| "output".to_string());

    std::fs::create_dir_all(&output_dir)?;
    let input_paths: Vec<&Path> = sources
        .iter()
        .filter_map(|source| match source {
            Source::File(path) => Some(Path::new(path.as_str())),
            Source::Url(_) => None,
        })
        .collect();
    report::clean_output_directory(&output_dir, &input_paths)?;

    match config.dedup.as_ref().filter(|dedup| !dedup.is_empty()) {
        Some(dedup) => {
            println!("🔑 Keys: {}", dedup.keys.join(", "));
            let priority: Vec<&str> = dedup.funnel_priority.iter().map(|s| s.label()).collect();
            println!("📊 Funnel priority: {}", priority.join(" > "));
        }
        None => println!("ℹ️  No [dedup] section, records will pass through unchanged"),
    }
    println!("📄 Output directory: {} (cleaned)", output_dir);

    let loader = DatasetLoader::new(config.table_selector.as_deref().unwrap_or("table"));
    let mut processed = 0usize;

    for (index, source) in sources.iter().enumerate() {
        println!("\n📄 Processing: {}", source.location());

        let dataset = match load_source(&loader, source).await {
            Ok(dataset) => dataset,
            Err(e) => {
                println!("   ❌ Error loading source: {:#}", e);
                continue;
            }
        };
        println!("   ✅ Loaded {} rows, {} columns", dataset.len(), dataset.columns().len());

        let outcome = match deduplicate(&dataset, config.dedup.as_ref()) {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("   ❌ Configuration error: {}", e);
                continue;
            }
        };

        let source_dir = Path::new(&output_dir).join(source.output_name(index));
        report::write_outcome(&outcome, source.location(), &source_dir)?;
        print_summary(&outcome, &source_dir);
        processed += 1;
    }

    if processed == 0 {
        anyhow::bail!("No source could be processed");
    }

    println!("\n✅ Deduplication complete! {} of {} sources processed.", processed, sources.len());
    println!("Check {} for deduplicated data and removal logs.", output_dir);
    Ok(())
}

fn configured_sources(config: &Config) -> Vec<Source> {
    let files = || {
        config
            .input_files
            .iter()
            .flatten()
            .cloned()
            .map(Source::File)
    };
    let urls = || {
        config
            .internet_urls
            .iter()
            .flatten()
            .cloned()
            .map(Source::Url)
    };

    match config.data_source_mode {
        DataSourceMode::Local => files().collect(),
        DataSourceMode::Internet => urls().collect(),
        DataSourceMode::Both => files().chain(urls()).collect(),
    }
}

async fn load_source(loader: &DatasetLoader, source: &Source) -> Result<Dataset> {
    let dataset = match source {
        Source::File(path) => loader
            .load_file(path)
            .with_context(|| format!("Failed to read file: {}", path))?,
        Source::Url(url) => loader
            .load_url(url)
            .await
            .with_context(|| format!("Failed to fetch URL: {}", url))?,
    };
    Ok(dataset)
}

fn print_summary(outcome: &DedupOutcome, source_dir: &Path) {
    let stats = &outcome.stats;
    if stats.removed_rows == 0 {
        println!("   ✨ No duplicates found");
    } else {
        println!(
            "   🔄 Removed {} of {} rows ({:.2}%)",
            stats.removed_rows,
            stats.total_rows,
            stats.removed_share * 100.0
        );
    }
    if stats.exceeds_threshold() {
        println!(
            "   ⚠️  Removed share exceeds threshold of {:.2}%",
            stats.threshold.unwrap_or_default() * 100.0
        );
    }
    println!("   📂 Results: {}", source_dir.display());
}

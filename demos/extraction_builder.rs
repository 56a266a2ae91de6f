use clap::Parser;
use std::error::Error;
use yield_elements::Extraction;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page to extract from
    #[arg(short, long)]
    url: String,

    /// XPath expression (repeatable)
    #[arg(short = 'x', long = "xpath", required = true)]
    xpaths: Vec<String>,

    /// JSON configuration string
    #[arg(short, long)]
    config: Option<String>,

    /// Path to JSON configuration file
    #[arg(short = 'f', long)]
    config_file: Option<String>,

    /// Maximum link depth
    #[arg(short, long)]
    depth: Option<usize>,

    /// Only extract from the given page
    #[arg(long)]
    single_page: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    println!("Extracting from URL: {}", args.url);

    let mut extraction = Extraction::new(args.url).with_patterns(args.xpaths);

    // Apply configuration from file if specified
    if let Some(config_file) = args.config_file {
        println!("Loading configuration from file: {}", config_file);
        extraction = extraction.with_config_file(config_file)?;
    }

    // Apply configuration from string if specified (overrides file config)
    if let Some(config_str) = args.config {
        println!("Applying configuration from string");
        extraction = extraction.with_config_str(&config_str)?;
    }

    if let Some(depth) = args.depth {
        println!("Overriding max depth: {}", depth);
        extraction = extraction.with_max_depth(depth);
    }

    let start_time = std::time::Instant::now();
    let records = extraction.recursive(!args.single_page).run().await?;

    for record in &records {
        print_record(record, 0);
    }
    println!(
        "Extraction complete. {} records in {:.2} seconds.",
        records.iter().map(|r| r.count_all()).sum::<usize>(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_record(record: &yield_elements::ElementRecord, depth: usize) {
    let marker = if record.is_pdf { " [PDF]" } else { "" };
    println!("{}{} -> {}{}", "  ".repeat(depth), record.text, record.href, marker);
    for child in &record.children {
        print_record(child, depth + 1);
    }
}

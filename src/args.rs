use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "yield-elements")]
#[command(author = "Ryan Northey <ryan@synca.io>")]
#[command(about = "Extracts elements from web pages by XPath, following links between pages")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Session file (overrides `store_path` from the configuration)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract matching elements and merge them into the saved tree
    Extract {
        /// Page to start from
        url: String,

        /// XPath expressions; the saved patterns are used when none are given
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,

        /// Only extract from the start page
        #[arg(long)]
        no_recursive: bool,

        /// How many links deep to follow
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Print the text of every node an XPath selects on a page
    Crawl {
        url: String,

        #[arg(short = 'x', long)]
        xpath: String,
    },

    /// Ask the model for patterns matching an element and save them
    Suggest {
        url: String,

        /// XPath of the element to analyze
        #[arg(short = 'x', long)]
        xpath: String,
    },

    /// Print the analysis prompt for an element without sending it
    Prompt {
        url: String,

        #[arg(short = 'x', long)]
        xpath: String,
    },

    /// Download every PDF in the saved tree
    DownloadPdfs {
        /// Target directory (overrides `download_dir`)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Remove saved elements and patterns
    Clear,

    /// Print saved patterns and elements
    Show,
}

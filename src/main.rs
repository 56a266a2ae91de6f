use clap::Parser;
use std::error::Error;
use std::io::Write;
use yield_elements::ai::{CredentialPrompt, GeminiClient};
use yield_elements::store::JsonFileStore;
use yield_elements::xpath::XPath;
use yield_elements::{Extractor, ExtractorConfig, Host, HttpFetcher, Request, Response, Session};

mod args;
use args::{Args, Command};

type CliHost = Host<JsonFileStore, HttpFetcher, GeminiClient>;

/// Reads the API key from the terminal
struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn request_api_key(&self) -> Option<String> {
        eprint!("Please enter your Gemini API key: ");
        std::io::stderr().flush().ok()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok()?;
        Some(line.trim().to_string()).filter(|key| !key.is_empty())
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_file(path)?,
        None => ExtractorConfig::default(),
    };
    if let Some(store) = args.store {
        config.store_path = store;
    }
    match &args.command {
        Command::Extract {
            max_depth: Some(depth),
            ..
        } => config.max_depth = *depth,
        Command::DownloadPdfs { dir: Some(dir) } => config.download_dir = dir.clone(),
        _ => {}
    }

    let mut session = Session::load(JsonFileStore::new(&config.store_path))?;
    session.seed_api_key(ExtractorConfig::api_key_from_env());

    let fetcher = HttpFetcher::new(&config.user_agent, config.fetch_timeout_ms)?;
    let suggester = GeminiClient::new(&config)?;
    let extractor = Extractor::new(fetcher, config);

    // Ctrl-C stops extraction between fetches
    let cancel = extractor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, stopping extraction");
            cancel.cancel();
        }
    });

    let mut host = Host::new(session, extractor, suggester).with_credential_prompt(StdinPrompt);

    let response = match args.command {
        Command::Extract {
            url,
            patterns,
            no_recursive,
            ..
        } => {
            open(&mut host, &url).await?;
            let patterns = if patterns.is_empty() {
                host.session().patterns().as_slice().to_vec()
            } else {
                host.session_mut().merge_patterns(&patterns)?;
                patterns
            };
            host.handle(Request::ExtractElementsByXPath {
                patterns,
                recursive: !no_recursive,
            })
            .await
        }
        Command::Crawl { url, xpath } => {
            open(&mut host, &url).await?;
            host.handle(Request::Crawl { xpath }).await
        }
        Command::Suggest { url, xpath } => {
            open_at(&mut host, &url, &xpath).await?;
            host.handle(Request::ExtractXPathFromElement {
                click_x: None,
                click_y: None,
            })
            .await
        }
        Command::Prompt { url, xpath } => {
            open_at(&mut host, &url, &xpath).await?;
            host.handle(Request::CopyPromptDirect {
                click_x: None,
                click_y: None,
            })
            .await
        }
        Command::DownloadPdfs { .. } => host.handle(Request::DownloadAllPdfs).await,
        Command::Clear => host.handle(Request::ClearData).await,
        Command::Show => {
            let saved = serde_json::json!({
                "patterns": host.session().patterns(),
                "elements": host.session().tree(),
            });
            println!("{}", serde_json::to_string_pretty(&saved)?);
            return Ok(());
        }
    };

    emit(&response)
}

/// Loads `url` as the current page
async fn open(host: &mut CliHost, url: &str) -> Result<(), Box<dyn Error>> {
    ::log::info!("Loading {}", url);
    let page = host.extractor().load(url).await?;
    host.set_page(page);
    Ok(())
}

/// Loads `url` and targets the first element `xpath` selects, as a right click would
async fn open_at(host: &mut CliHost, url: &str, xpath: &str) -> Result<(), Box<dyn Error>> {
    open(host, url).await?;
    let target = match host.page() {
        Some(page) => XPath::compile(xpath)?.select_elements(page)?.into_iter().next(),
        None => None,
    };
    let Some(target) = target else {
        return Err(format!("{} selects no element on {}", xpath, url).into());
    };
    host.session_mut().remember_right_click(Some(target));
    Ok(())
}

fn emit(response: &Response) -> Result<(), Box<dyn Error>> {
    if let Response::Prompt { prompt, .. } = response {
        println!("{}", prompt);
    } else {
        println!("{}", serde_json::to_string_pretty(response)?);
    }
    if response.is_success() {
        Ok(())
    } else {
        Err("request did not succeed".into())
    }
}

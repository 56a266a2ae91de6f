//! Named request/response actions exchanged between the page, the panel and
//! the background host, and the [`Host`] that answers them.

use crate::ai::{
    self, CredentialPrompt, NoPrompt, PatternSuggester, PromptAction, StoredPrompt,
};
use crate::crawlers::{Extractor, Fetcher};
use crate::dom::{Document, NodeId};
use crate::download::download_all;
use crate::error::{AiError, ExtractError};
use crate::resolver::resolve_target;
use crate::results::{ElementRecord, PdfInfo};
use crate::session::{SelectedElement, Session};
use crate::store::KeyValueStore;
use crate::xpath::XPath;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

fn default_recursive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    ExtractElementsByXPath {
        #[serde(alias = "xpathExpressions")]
        patterns: Vec<String>,
        #[serde(default = "default_recursive")]
        recursive: bool,
    },
    AnalyzeElementWithGemini {
        html: String,
        #[serde(default)]
        text: String,
        #[serde(default)]
        href: String,
        #[serde(default)]
        is_pdf: bool,
        #[serde(default)]
        pdf_info: Option<PdfInfo>,
    },
    ElementClicked(ElementRecord),
    /// A click at a viewport point, recorded when click tracking is on
    PageClicked {
        click_x: f64,
        click_y: f64,
    },
    /// The context menu opened at a viewport point
    ContextMenu {
        click_x: f64,
        click_y: f64,
    },
    InspectElement {
        click_x: f64,
        click_y: f64,
    },
    ToggleSaveElement {
        save: bool,
    },
    #[serde(rename = "toggleCheckXPath")]
    ToggleCheckXPath {
        #[serde(rename = "checkXPath")]
        check_xpath: bool,
    },
    GetSaveElementsState,
    #[serde(rename = "getCheckXPathState")]
    GetCheckXPathState,
    SetGeminiApiKey {
        api_key: String,
    },
    Crawl {
        xpath: String,
    },
    #[serde(rename = "extractXPathFromElement")]
    ExtractXPathFromElement {
        #[serde(default)]
        click_x: Option<f64>,
        #[serde(default)]
        click_y: Option<f64>,
    },
    CopyPromptDirect {
        #[serde(default)]
        click_x: Option<f64>,
        #[serde(default)]
        click_y: Option<f64>,
    },
    ClearData,
    DownloadAllPdfs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Extracted {
        success: bool,
        elements: Vec<ElementRecord>,
        /// Top-level records
        count: usize,
        /// Records including every nested child
        total: usize,
    },
    Suggested {
        success: bool,
        patterns: Vec<String>,
        added: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Tracked {
        success: bool,
        element: Option<ElementRecord>,
    },
    Downloaded {
        success: bool,
        succeeded: usize,
        failed: usize,
    },
    Prompt {
        success: bool,
        prompt: String,
    },
    Data {
        data: Vec<String>,
    },
    SaveElementsState {
        #[serde(rename = "saveElementsState")]
        save_elements_state: bool,
    },
    CheckXPathState {
        #[serde(rename = "checkXPathState")]
        check_xpath_state: bool,
    },
    Selected(SelectedElement),
    Ack {
        success: bool,
    },
    Failed {
        success: bool,
        error: String,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn ack() -> Self {
        Self::Ack { success: true }
    }

    pub fn failed(error: impl Display) -> Self {
        Self::Failed {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Self::Failed { .. } | Self::Error { .. } | Self::Suggested { success: false, .. }
        )
    }
}

/// Answers requests against one session, the page currently shown, an
/// extractor and a pattern suggester
pub struct Host<S: KeyValueStore, F: Fetcher, A: PatternSuggester> {
    session: Session<S>,
    page: Option<Document>,
    extractor: Extractor<F>,
    suggester: A,
    credentials: Box<dyn CredentialPrompt + Send + Sync>,
    last_prompt: Option<StoredPrompt>,
}

impl<S: KeyValueStore, F: Fetcher, A: PatternSuggester> Host<S, F, A> {
    pub fn new(session: Session<S>, extractor: Extractor<F>, suggester: A) -> Self {
        Self {
            session,
            page: None,
            extractor,
            suggester,
            credentials: Box::new(NoPrompt),
            last_prompt: None,
        }
    }

    pub fn with_credential_prompt(
        mut self,
        credentials: impl CredentialPrompt + Send + Sync + 'static,
    ) -> Self {
        self.credentials = Box::new(credentials);
        self
    }

    /// Replaces the page requests are answered against
    pub fn set_page(&mut self, page: Document) {
        self.session.remember_right_click(None);
        self.page = Some(page);
    }

    pub fn page(&self) -> Option<&Document> {
        self.page.as_ref()
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    pub fn extractor(&self) -> &Extractor<F> {
        &self.extractor
    }

    pub fn last_prompt(&self) -> Option<&StoredPrompt> {
        self.last_prompt.as_ref()
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::ExtractElementsByXPath {
                patterns,
                recursive,
            } => self.extract(&patterns, recursive).await,
            Request::AnalyzeElementWithGemini {
                html,
                text,
                href,
                is_pdf,
                pdf_info,
            } => {
                if is_pdf {
                    ::log::debug!(
                        "Analyzing PDF link {}",
                        pdf_info.map(|info| info.url).unwrap_or_else(|| href.clone())
                    );
                }
                self.analyze(&html, &text, &href).await
            }
            Request::ElementClicked(record) => match self.session.merge_records(vec![record]) {
                Ok(_) => Response::ack(),
                Err(e) => Response::failed(e),
            },
            Request::PageClicked { click_x, click_y } => self.page_clicked(click_x, click_y),
            Request::ContextMenu { click_x, click_y } => {
                let target = self
                    .page
                    .as_ref()
                    .and_then(|page| page.element_from_point(click_x, click_y));
                self.session.remember_right_click(target);
                Response::ack()
            }
            Request::InspectElement { click_x, click_y } => self.inspect(click_x, click_y),
            Request::ToggleSaveElement { save } => match self.session.set_save_elements(save) {
                Ok(()) => self.save_state(),
                Err(e) => Response::failed(e),
            },
            Request::ToggleCheckXPath { check_xpath } => {
                match self.session.set_check_xpath(check_xpath) {
                    Ok(()) => self.check_state(),
                    Err(e) => Response::failed(e),
                }
            }
            Request::GetSaveElementsState => self.save_state(),
            Request::GetCheckXPathState => self.check_state(),
            Request::SetGeminiApiKey { api_key } => match self.session.set_api_key(&api_key) {
                Ok(()) => Response::ack(),
                Err(e) => Response::failed(e),
            },
            Request::Crawl { xpath } => self.crawl(&xpath),
            Request::ExtractXPathFromElement { click_x, click_y } => {
                match self.describe_target(click_x, click_y) {
                    Ok((html, text, href)) => self.analyze(&html, &text, &href).await,
                    Err(e) => Response::failed(e),
                }
            }
            Request::CopyPromptDirect { click_x, click_y } => self.copy_prompt(click_x, click_y),
            Request::ClearData => match self.session.clear() {
                Ok(()) => Response::ack(),
                Err(e) => Response::failed(e),
            },
            Request::DownloadAllPdfs => self.download_pdfs().await,
        }
    }

    /// Runs extraction on the current page and merges the results into the tree
    pub async fn extract(&mut self, patterns: &[String], recursive: bool) -> Response {
        let Some(page) = self.page.as_ref() else {
            return Response::failed(ExtractError::NoCurrentPage);
        };
        self.last_prompt = Some(StoredPrompt {
            action: PromptAction::ExtractElements,
            text: ai::extract_elements_prompt(patterns, recursive, &page.url),
        });

        let records = match self.extractor.extract(patterns, page, recursive).await {
            Ok(records) => records,
            Err(e) => {
                ::log::error!("Extraction failed: {}", e);
                return Response::failed(e);
            }
        };

        let count = records.len();
        let total = records.iter().map(ElementRecord::count_all).sum();
        match self.session.merge_records(records.clone()) {
            Ok(inserted) => {
                ::log::info!("Merged {} new records into the saved tree", inserted);
                Response::Extracted {
                    success: true,
                    elements: records,
                    count,
                    total,
                }
            }
            Err(e) => Response::failed(e),
        }
    }

    /// Asks the suggester for patterns matching an element and adds them to the inputs
    pub async fn analyze(&mut self, html: &str, text: &str, href: &str) -> Response {
        let prompt = ai::element_analysis_prompt(html, text, href);
        self.last_prompt = Some(StoredPrompt {
            action: PromptAction::ElementAnalysis,
            text: prompt.clone(),
        });

        let api_key = match self.api_key() {
            Ok(key) => key,
            Err(e) => return Response::failed(e),
        };

        let reply = match self.suggester.generate(&api_key, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                ::log::error!("Pattern suggestion failed: {}", e);
                return Response::failed(e);
            }
        };

        match ai::parse_candidates(&reply) {
            Ok(candidates) if !candidates.is_empty() => {
                match self.session.merge_patterns(&candidates) {
                    Ok(added) => {
                        ::log::info!("Received {} pattern candidates, {} new", candidates.len(), added);
                        Response::Suggested {
                            success: true,
                            patterns: candidates,
                            added,
                            warning: None,
                        }
                    }
                    Err(e) => Response::failed(e),
                }
            }
            Ok(_) => no_candidates("the response listed no patterns".to_string()),
            Err(e) => no_candidates(e.to_string()),
        }
    }

    /// The stored API key, or one supplied by the user and then stored
    fn api_key(&mut self) -> Result<String, AiError> {
        if let Some(key) = self.session.api_key() {
            return Ok(key.to_string());
        }
        let key = self
            .credentials
            .request_api_key()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(AiError::MissingCredential)?;
        if let Err(e) = self.session.set_api_key(&key) {
            ::log::warn!("Could not store the API key: {}", e);
        }
        Ok(key)
    }

    fn page_clicked(&mut self, x: f64, y: f64) -> Response {
        let Some(page) = self.page.as_ref() else {
            return Response::failed(ExtractError::NoCurrentPage);
        };
        let Some(target) = page.element_from_point(x, y) else {
            return Response::Tracked {
                success: true,
                element: None,
            };
        };
        match self.session.track_click(page, target) {
            Ok(element) => Response::Tracked {
                success: true,
                element,
            },
            Err(e) => Response::failed(e),
        }
    }

    fn inspect(&mut self, x: f64, y: f64) -> Response {
        let Some(page) = self.page.as_mut() else {
            return Response::failed(ExtractError::NoCurrentPage);
        };
        let Some(target) = page.element_from_point(x, y) else {
            return Response::Error {
                error: "no element at that point".to_string(),
            };
        };
        match self.session.inspect(page, target) {
            Ok(selected) => Response::Selected(selected),
            Err(e) => Response::failed(e),
        }
    }

    /// Text of every node the expression selects on the current page
    fn crawl(&self, xpath: &str) -> Response {
        let Some(page) = self.page.as_ref() else {
            return Response::Error {
                error: ExtractError::NoCurrentPage.to_string(),
            };
        };
        match XPath::compile(xpath).and_then(|x| x.select_strings(page)) {
            Ok(data) => Response::Data { data },
            Err(e) => Response::Error {
                error: e.to_string(),
            },
        }
    }

    fn copy_prompt(&mut self, x: Option<f64>, y: Option<f64>) -> Response {
        match self.describe_target(x, y) {
            Ok((html, text, href)) => {
                let prompt = ai::element_analysis_prompt(&html, &text, &href);
                self.last_prompt = Some(StoredPrompt {
                    action: PromptAction::ElementAnalysis,
                    text: prompt.clone(),
                });
                Response::Prompt {
                    success: true,
                    prompt,
                }
            }
            Err(e) => match &self.last_prompt {
                Some(stored) => {
                    ::log::debug!("{}, copying the previous prompt", e);
                    Response::Prompt {
                        success: true,
                        prompt: stored.text.clone(),
                    }
                }
                None => Response::failed(e),
            },
        }
    }

    /// Outer HTML, trimmed text and link of the element a context action targets
    fn describe_target(
        &self,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<(String, String, String), String> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| ExtractError::NoCurrentPage.to_string())?;
        let target: NodeId = resolve_target(page, self.session.last_right_clicked(), x, y)
            .map_err(|e| e.to_string())?;

        ::log::debug!("Resolved target {}", page.xpath_for(target));
        Ok((
            page.outer_html(target),
            page.text_content(target).trim().to_string(),
            page.resolve_href(target).unwrap_or_default(),
        ))
    }

    async fn download_pdfs(&self) -> Response {
        let records = self.session.tree().pdf_records();
        if records.is_empty() {
            return Response::failed("no PDF links in the saved elements");
        }
        let config = self.extractor.config();
        ::log::info!("Downloading {} PDF(s) to {}", records.len(), config.download_dir.display());

        let report = download_all(
            self.extractor.fetcher(),
            &records,
            &config.download_dir,
            Duration::from_millis(config.download_stagger_ms),
        )
        .await;
        Response::Downloaded {
            success: report.failed == 0,
            succeeded: report.succeeded,
            failed: report.failed,
        }
    }

    fn save_state(&self) -> Response {
        Response::SaveElementsState {
            save_elements_state: self.session.save_elements(),
        }
    }

    fn check_state(&self) -> Response {
        Response::CheckXPathState {
            check_xpath_state: self.session.check_xpath(),
        }
    }
}

fn no_candidates(reason: String) -> Response {
    ::log::warn!("No pattern options found: {}", reason);
    Response::Suggested {
        success: false,
        patterns: Vec::new(),
        added: 0,
        warning: Some(reason),
    }
}

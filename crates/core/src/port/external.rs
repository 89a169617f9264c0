// External collaborator ports (spec §1, §6): the HTML fetcher/parser, the
// LLM client, connector libraries. Treated as out-of-scope collaborators —
// referenced only through their contracts, with deterministic mocks for
// exercising the StepManagers/JobKinds that depend on them.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("timeout after {0}ms")]
    Timeout(i64),
    #[error("scraping error: {0}")]
    Scraping(String),
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub rate_limit_ms: u64,
    pub concurrency: u8,
    pub max_depth: u32,
    pub enable_javascript: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub success: bool,
    pub status: u16,
    pub title: Option<String>,
    pub content_markdown: String,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Already normalized/deduped by the scraper (spec §4.6 step 7).
    pub links: Vec<String>,
    pub timestamp: i64,
    pub duration_ms: i64,
}

/// HTML fetcher/parser. Out of scope per spec §1 — no production body here.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(
        &self,
        url: &str,
        config: &ScrapeConfig,
    ) -> Result<ScrapeResult, CollaboratorError>;
}

/// LLM client. Out of scope per spec §1.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[String]) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct RepoFile {
    pub path: String,
    pub branch: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: String,
    pub name: String,
    pub conclusion: Option<String>,
    pub log_url: Option<String>,
}

/// GitHub connector. Out of scope per spec §1.
#[async_trait]
pub trait GitHubConnector: Send + Sync {
    async fn list_files(
        &self,
        repo: &str,
        branches: &[String],
    ) -> Result<Vec<String>, CollaboratorError>;

    async fn list_workflow_runs(
        &self,
        repo: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, CollaboratorError>;

    async fn fetch_files_batch(
        &self,
        repo: &str,
        paths: &[String],
    ) -> Result<Vec<RepoFile>, CollaboratorError>;
}

/// Grounded web search client. Out of scope per spec §1.
#[async_trait]
pub trait GeminiClient: Send + Sync {
    async fn grounded_search(&self, query: &str) -> Result<String, CollaboratorError>;
}

pub mod mocks {
    use super::*;

    /// Always-succeeds scraper returning empty links, for exercising the
    /// crawl JobKind's happy path without a real HTTP stack.
    pub struct StaticScraper {
        pub links: Vec<String>,
        pub content: String,
    }

    impl StaticScraper {
        pub fn new(content: impl Into<String>, links: Vec<String>) -> Self {
            Self {
                links,
                content: content.into(),
            }
        }

        pub fn empty() -> Self {
            Self::new(String::new(), Vec::new())
        }
    }

    #[async_trait]
    impl Scraper for StaticScraper {
        async fn scrape(
            &self,
            _url: &str,
            _config: &ScrapeConfig,
        ) -> Result<ScrapeResult, CollaboratorError> {
            Ok(ScrapeResult {
                success: true,
                status: 200,
                title: Some("mock".to_string()),
                content_markdown: self.content.clone(),
                description: None,
                language: Some("en".to_string()),
                links: self.links.clone(),
                timestamp: 0,
                duration_ms: 1,
            })
        }
    }

    pub struct EchoLlmClient;

    #[async_trait]
    impl LlmClient for EchoLlmClient {
        async fn chat(&self, messages: &[String]) -> Result<String, CollaboratorError> {
            Ok(messages.join("\n"))
        }
    }

    /// Grounded-search stand-in that echoes the query back as a result, for
    /// exercising the web_search StepManager without a real Gemini client.
    pub struct EchoGeminiClient;

    #[async_trait]
    impl GeminiClient for EchoGeminiClient {
        async fn grounded_search(&self, query: &str) -> Result<String, CollaboratorError> {
            Ok(format!("search results for: {query}"))
        }
    }

    pub struct EmptyGitHubConnector;

    #[async_trait]
    impl GitHubConnector for EmptyGitHubConnector {
        async fn list_files(
            &self,
            _repo: &str,
            _branches: &[String],
        ) -> Result<Vec<String>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn list_workflow_runs(
            &self,
            _repo: &str,
            _limit: usize,
        ) -> Result<Vec<WorkflowRun>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn fetch_files_batch(
            &self,
            _repo: &str,
            _paths: &[String],
        ) -> Result<Vec<RepoFile>, CollaboratorError> {
            Ok(Vec::new())
        }
    }
}

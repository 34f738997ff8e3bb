//! Search tools implemented with daedra
//!
//! `web_search` queries DuckDuckGo and returns titled, URL-bearing results so
//! that compressed findings can cite them. `fetch_page` converts a page to
//! markdown, truncated to keep the researcher's context bounded.

use crate::tools::registry::Tool;
use crate::types::ToolError;
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_NUM_RESULTS: usize = 5;
const DEFAULT_MAX_PAGE_CHARS: usize = 12_000;

/// Web search tool powered by daedra
pub struct SearchTool {
    default_results: usize,
}

impl SearchTool {
    pub fn new() -> Self {
        Self {
            default_results: DEFAULT_NUM_RESULTS,
        }
    }

    pub fn with_default_results(default_results: usize) -> Self {
        Self {
            default_results: default_results.max(1),
        }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns titles, URLs and snippets for citation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": self.default_results
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' parameter".to_string()))?;

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_results);

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| ToolError::Execution(format!("Search failed: {}", e)))?;

        let results: Vec<Value> = response
            .data
            .iter()
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "description": r.description
                })
            })
            .collect();

        Ok(json!({
            "query": query,
            "results": results,
            "count": results.len()
        }))
    }
}

/// Page fetching tool powered by daedra
pub struct FetchPageTool {
    max_chars: usize,
}

impl FetchPageTool {
    pub fn new() -> Self {
        Self {
            max_chars: DEFAULT_MAX_PAGE_CHARS,
        }
    }

    pub fn with_max_chars(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for FetchPageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchPageTool {
    fn name(&self) -> &str {
        "fetch_page"
    }

    fn description(&self) -> &str {
        "Fetch a web page found by web_search and convert it to markdown"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the page to fetch"
                },
                "selector": {
                    "type": "string",
                    "description": "Optional CSS selector to extract specific content"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' parameter".to_string()))?;

        let selector = args
            .get("selector")
            .and_then(|v| v.as_str())
            .map(String::from);

        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector,
        };

        let page = daedra::tools::fetch::fetch_page(&fetch_args)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to fetch page: {}", e)))?;

        let truncated = page.content.chars().count() > self.max_chars;
        let content: String = page.content.chars().take(self.max_chars).collect();

        Ok(json!({
            "url": page.url,
            "title": page.title,
            "content": content,
            "truncated": truncated,
            "word_count": page.word_count
        }))
    }
}

//! External HTTP classifier strategy: delegates ticker extraction to an
//! OpenAI-compatible chat completion endpoint.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::ClassifierConfig;

const PROMPT_PREFIX: &str = "From the following news article text, extract all relevant US stock market \
ticker symbols. The article may contain noise, XML tags, or other non-relevant information. Focus only \
on the ticker symbols (e.g., AAPL, GOOG, MSFT). Return the symbols as a JSON-formatted list of strings \
under the key \"symbols\". If no symbols are found, return an empty list.\n\nArticle Text:\n---\n";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SymbolList {
    #[serde(default)]
    symbols: Vec<String>,
}

/// HTTP client over the external ticker classifier. Bearer auth, JSON mode,
/// a total request deadline, and validation restricting results to 1-5 letter
/// uppercase alphabetic tokens.
#[derive(Debug)]
pub struct ClassifierClient {
    http: reqwest::Client,
    config: ClassifierConfig,
}

impl ClassifierClient {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn extract_tickers(&self, news_text: &str) -> BTreeSet<String> {
        if self.config.api_key.is_empty() {
            error!("classifier api key not configured, cannot extract symbols");
            return BTreeSet::new();
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{PROMPT_PREFIX}{news_text}\n---\n"),
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .timeout(self.config.timeout)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                error!(%err, "classifier request failed");
                return BTreeSet::new();
            },
        };

        let parsed: Result<ChatResponse, _> = response.json().await;
        let body = match parsed {
            Ok(body) => body,
            Err(err) => {
                error!(%err, "failed to decode classifier response");
                return BTreeSet::new();
            },
        };

        let Some(choice) = body.choices.into_iter().next() else {
            warn!("classifier response had no choices");
            return BTreeSet::new();
        };

        match serde_json::from_str::<SymbolList>(&choice.message.content) {
            Ok(list) => list.symbols.into_iter().filter_map(validate_symbol).collect(),
            Err(err) => {
                error!(%err, content = %choice.message.content, "classifier content was not valid JSON");
                BTreeSet::new()
            },
        }
    }
}

/// 1-5 letter uppercase alphabetic tokens only.
fn validate_symbol(symbol: String) -> Option<String> {
    let upper = symbol.to_uppercase();
    let valid = (1..=5).contains(&upper.len()) && upper.chars().all(|c| c.is_ascii_alphabetic());
    valid.then_some(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_short_alphabetic_tokens() {
        assert_eq!(validate_symbol("aapl".to_string()), Some("AAPL".to_string()));
        assert_eq!(validate_symbol("toolongticker".to_string()), None);
        assert_eq!(validate_symbol("AB12".to_string()), None);
        assert_eq!(validate_symbol(String::new()), None);
    }
}

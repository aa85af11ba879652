//! Chat-completion client for the relevance gate and urgency scorer.
//!
//! Two calls per article:
//! - **Relevance**: could this article affect charitable giving or
//!   create needs for charitable work? The model answers `RELEVANT` or
//!   `IRRELEVANT` with a one-line reason.
//! - **Urgency**: a 1–10 rating of the situation's immediate funding
//!   needs, in the exact format `Urgency Score: N`.
//!
//! Both replies are semi-structured text; the parsers below are pure
//! functions with the fallbacks the engine relies on (a failed
//! relevance check includes the article, an unparseable urgency falls
//! back to the configured default).
//!
//! Retry policy matches the embedding client: 429/5xx and network
//! errors are retried with exponential backoff, other 4xx fail fast.

use anyhow::{bail, Result};
use std::time::Duration;

use causeway_core::models::Article;

use crate::config::LlmConfig;

const RELEVANCE_SYSTEM_PROMPT: &str = "You are a charity impact analyst. Your job is to determine if news articles could affect charitable giving or create needs for charitable work.\n\nConsider:\n- Could this affect people's willingness or ability to donate?\n- Might this create new needs for charitable assistance?\n- Could this influence how charities operate?\n- Might this affect vulnerable populations?\n\nMark articles as relevant if there's any potential charitable impact.\nAnswer on the first line with exactly RELEVANT or IRRELEVANT, followed by a one-line reason.";

const URGENCY_SYSTEM_PROMPT: &str = "You are an expert at assessing humanitarian and charitable funding urgency. Be objective and analytical in your assessment.";

/// The relevance gate's verdict for one article.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceVerdict {
    pub relevant: bool,
    pub reason: String,
}

/// Ask the model whether an article matters for charitable impact.
pub async fn check_relevance(config: &LlmConfig, article: &Article) -> Result<RelevanceVerdict> {
    let user_prompt = format!(
        "Analyze this article for charitable impact:\nTitle: {}\nDescription: {}",
        article.title, article.description
    );

    let reply = chat_completion(
        config,
        &config.relevance_model,
        RELEVANCE_SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    Ok(parse_relevance(&reply))
}

/// Ask the model to rate an article's funding urgency from 1 to 10.
///
/// Returns the parsed score; when the reply does not match the
/// requested format, `default_urgency` is used instead.
pub async fn score_urgency(
    config: &LlmConfig,
    article: &Article,
    default_urgency: f64,
) -> Result<f64> {
    let user_prompt = format!(
        "Article Title: {}\nDescription: {}\n\n\
         On a scale of 1-10, rate the urgency of this situation in terms of immediate funding needs, where:\n\
         1 = No immediate funding urgency\n\
         10 = Extremely urgent, immediate funding crucial\n\n\
         Consider factors like:\n\
         - Immediate threat to life or well-being\n\
         - Time-sensitivity of the situation\n\
         - Scale of impact\n\
         - Current resource availability\n\
         - Vulnerability of affected populations\n\n\
         Provide your response in this exact format:\n\
         \"Urgency Score: [number 1-10]\n\
         Brief Reason: [one-line explanation]\"",
        article.title, article.description
    );

    let reply = chat_completion(
        config,
        &config.urgency_model,
        URGENCY_SYSTEM_PROMPT,
        &user_prompt,
    )
    .await?;

    Ok(parse_urgency(&reply).unwrap_or(default_urgency))
}

/// Parse a relevance reply. Looks for `IRRELEVANT` first since
/// `RELEVANT` is a substring of it; an unrecognizable reply counts as
/// relevant, matching the engine's include-on-failure policy.
pub fn parse_relevance(reply: &str) -> RelevanceVerdict {
    let first_line = reply.lines().next().unwrap_or("").trim();
    let upper = first_line.to_uppercase();

    let relevant = !upper.contains("IRRELEVANT");
    let reason = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.to_uppercase().starts_with("RELEVANT") && !l.to_uppercase().starts_with("IRRELEVANT"))
        .unwrap_or(first_line)
        .to_string();

    RelevanceVerdict { relevant, reason }
}

/// Parse an `Urgency Score: N` reply. Returns `None` when no score in
/// `[1, 10]` can be extracted.
pub fn parse_urgency(reply: &str) -> Option<f64> {
    let line = reply
        .lines()
        .find(|l| l.to_lowercase().contains("urgency score"))?;
    let after_colon = line.split(':').nth(1)?;

    let number: String = after_colon
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let score: f64 = number.parse().ok()?;
    if (1.0..=10.0).contains(&score) {
        Some(score)
    } else {
        None
    }
}

/// Send one chat completion and return the assistant's text reply.
async fn chat_completion(
    config: &LlmConfig,
    model: &str,
    system: &str,
    user: &str,
) -> Result<String> {
    if !config.is_enabled() {
        bail!("LLM provider is disabled");
    }

    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "temperature": config.temperature,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_chat_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("Chat API error {}: {}", status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Chat API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
}

/// Extract `choices[0].message.content` from a chat response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urgency_exact_format() {
        let reply = "Urgency Score: 8\nBrief Reason: Immediate displacement crisis";
        assert_eq!(parse_urgency(reply), Some(8.0));
    }

    #[test]
    fn test_parse_urgency_decimal() {
        assert_eq!(parse_urgency("Urgency Score: 7.5\nBrief Reason: x"), Some(7.5));
    }

    #[test]
    fn test_parse_urgency_quoted_and_padded() {
        let reply = "\"Urgency Score: 9\nBrief Reason: flood\"";
        assert_eq!(parse_urgency(reply), Some(9.0));
    }

    #[test]
    fn test_parse_urgency_out_of_range() {
        assert_eq!(parse_urgency("Urgency Score: 0\nBrief Reason: none"), None);
        assert_eq!(parse_urgency("Urgency Score: 42\nBrief Reason: ?"), None);
    }

    #[test]
    fn test_parse_urgency_garbage() {
        assert_eq!(parse_urgency("I cannot rate this article."), None);
        assert_eq!(parse_urgency("Urgency Score: N/A\nBrief Reason: error"), None);
        assert_eq!(parse_urgency(""), None);
    }

    #[test]
    fn test_parse_relevance_relevant() {
        let v = parse_relevance("RELEVANT\nThis affects flood victims directly.");
        assert!(v.relevant);
        assert_eq!(v.reason, "This affects flood victims directly.");
    }

    #[test]
    fn test_parse_relevance_irrelevant() {
        let v = parse_relevance("IRRELEVANT\nCelebrity gossip, no charitable angle.");
        assert!(!v.relevant);
    }

    #[test]
    fn test_parse_relevance_defaults_to_relevant() {
        // Include-on-failure: an off-format reply must not drop the article.
        let v = parse_relevance("This article discusses economic policy.");
        assert!(v.relevant);
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  hello  " } }
            ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "hello");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }
}

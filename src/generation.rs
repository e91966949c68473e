//! Text generation service.
//!
//! [`GenerationService`] is the seam between the pipeline and the language
//! model: a health check, a way to start the service when it is down, and a
//! prompt-in/text-out call. [`OllamaGenerator`] talks to a local Ollama
//! server through `POST /api/generate`.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::PipelineError;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait GenerationService: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the service answers right now.
    async fn is_running(&self) -> bool;

    /// Launch the service in the background. Returns once the process is
    /// spawned, not once it is ready.
    async fn start(&self) -> Result<()>;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Make sure the service is reachable, starting it if needed.
///
/// When the first check fails the service is started, then checked again
/// once after `wait`. There is no further retry.
pub async fn ensure_running(
    service: &dyn GenerationService,
    wait: Duration,
) -> Result<(), PipelineError> {
    if service.is_running().await {
        return Ok(());
    }

    tracing::info!(service = service.name(), "generation service not reachable, starting it");
    service
        .start()
        .await
        .map_err(|e| PipelineError::ServiceUnavailable(format!("{:#}", e)))?;

    tokio::time::sleep(wait).await;

    if service.is_running().await {
        tracing::info!(service = service.name(), "generation service started");
        Ok(())
    } else {
        Err(PipelineError::ServiceUnavailable(format!(
            "{} still unreachable after {}s",
            service.name(),
            wait.as_secs()
        )))
    }
}

pub struct OllamaGenerator {
    url: String,
    model: String,
    temperature: f64,
    serve_command: Vec<String>,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            serve_command: config.serve_command.clone(),
            client,
        })
    }
}

#[async_trait]
impl GenerationService for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn is_running(&self) -> bool {
        self.client
            .get(&self.url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .is_ok()
    }

    async fn start(&self) -> Result<()> {
        let (program, args) = self
            .serve_command
            .split_first()
            .context("generation.serve_command is empty")?;

        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.serve_command.join(" ")))?;
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .context("Invalid Ollama response: missing response field")?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports down until `start` has been called.
    struct SleepyService {
        started: AtomicUsize,
        comes_up: bool,
    }

    #[async_trait]
    impl GenerationService for SleepyService {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn is_running(&self) -> bool {
            self.comes_up && self.started.load(Ordering::SeqCst) > 0
        }

        async fn start(&self) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_ensure_running_starts_once_and_rechecks() {
        let service = SleepyService {
            started: AtomicUsize::new(0),
            comes_up: true,
        };
        ensure_running(&service, Duration::ZERO).await.unwrap();
        assert_eq!(service.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_running_gives_up_after_one_recheck() {
        let service = SleepyService {
            started: AtomicUsize::new(0),
            comes_up: false,
        };
        let err = ensure_running(&service, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, PipelineError::ServiceUnavailable(_)));
        assert_eq!(service.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_serve_binary_is_start_error() {
        let config = GenerationConfig {
            url: "http://127.0.0.1:9".to_string(),
            serve_command: vec!["csum-no-such-binary-for-tests".to_string()],
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        assert!(!generator.is_running().await);
        assert!(generator.start().await.is_err());
    }
}

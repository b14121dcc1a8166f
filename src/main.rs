use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use web_gpt_rs::config::{load_models, Settings};
use web_gpt_rs::router::SessionRouter;
use web_gpt_rs::web::WebServer;

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    api_key_header: Regex,
    key_field: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            api_key_header: Regex::new(r#"(?i)(api-key['"]?\s*[:=]\s*['"]?)[A-Za-z0-9_\-]{8,}"#)?,
            key_field: Regex::new(r#""key"\s*:\s*"[^"]+""#)?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._\-]{8,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .api_key_header
            .replace_all(&output, "$1[API_KEY]")
            .to_string();
        output = self
            .key_field
            .replace_all(&output, r#""key": "[API_KEY]""#)
            .to_string();
        output = self.bearer.replace_all(&output, "$1[API_KEY]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting Web GPT relay...");

    let settings = init_settings();
    let models = init_models(&settings);

    let router = SessionRouter::new(&models, &settings);
    info!("Session router initialized with {} model(s).", models.len());

    let server = WebServer::new(settings, router)?;
    server.start().await?;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_models(settings: &Settings) -> Vec<web_gpt_rs::config::ModelConfig> {
    match load_models(&settings.models_path) {
        Ok(models) => {
            info!(
                "Model list loaded from {} ({} entries).",
                settings.models_path,
                models.len()
            );
            models
        }
        Err(e) => {
            error!("Failed to load model list: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction_masks_key_material() {
        let patterns = RedactionPatterns::new().expect("compile patterns");

        let redacted = patterns.redact(r#"request headers: api-key: abcdef1234567890"#);
        assert!(!redacted.contains("abcdef1234567890"));
        assert!(redacted.contains("[API_KEY]"));

        let redacted = patterns.redact(r#"config entry {"key": "super-secret-value"}"#);
        assert!(!redacted.contains("super-secret-value"));

        let redacted = patterns.redact("Authorization: Bearer sk-abc123def456");
        assert!(!redacted.contains("sk-abc123def456"));
    }

    #[test]
    fn test_redaction_leaves_ordinary_text_alone() {
        let patterns = RedactionPatterns::new().expect("compile patterns");
        let text = "routing message to model GPT4 with 800 tokens";
        assert_eq!(patterns.redact(text), text);
    }
}

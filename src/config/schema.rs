use crate::extract::ElementKind;
use crate::format::FormatStyle;
use crate::output::OutputMode;
use serde::Deserialize;
use std::fmt;

/// Top-level configuration file.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PatcherConfig {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub rewrite: RewriteSettings,
}

/// Settings for the chat-completions annotation provider.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub organization: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
            organization: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteSettings {
    pub mode: OutputMode,
    /// Annotation requests in flight per file.
    pub concurrency: usize,
    /// Element kinds that receive a new docstring.
    pub kinds: Vec<ElementKind>,
    pub compact_single_line: bool,
    /// Re-parse rewritten text and refuse to persist it if it is broken.
    pub validate_output: bool,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            concurrency: 1,
            kinds: ElementKind::ALL.to_vec(),
            compact_single_line: FormatStyle::default().compact_single_line,
            validate_output: true,
        }
    }
}

impl RewriteSettings {
    pub fn style(&self) -> FormatStyle {
        FormatStyle {
            compact_single_line: self.compact_single_line,
        }
    }
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let provider = &self.provider;

        if provider.base_url.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "provider.base_url",
            });
        } else if !provider.base_url.starts_with("http://")
            && !provider.base_url.starts_with("https://")
        {
            issues.push(ValidationIssue::OutOfRange {
                field: "provider.base_url",
                message: format!("'{}' is not an http(s) URL", provider.base_url),
            });
        }
        if provider.model.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "provider.model",
            });
        }
        if provider.api_key_env.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "provider.api_key_env",
            });
        }
        if provider.max_tokens == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "provider.max_tokens",
                message: "must be at least 1".to_string(),
            });
        }
        if provider.timeout_secs == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "provider.timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            issues.push(ValidationIssue::OutOfRange {
                field: "provider.temperature",
                message: format!("{} is outside 0.0..=2.0", provider.temperature),
            });
        }
        if !(0.0..=1.0).contains(&provider.top_p) {
            issues.push(ValidationIssue::OutOfRange {
                field: "provider.top_p",
                message: format!("{} is outside 0.0..=1.0", provider.top_p),
            });
        }
        for (field, value) in [
            ("provider.frequency_penalty", provider.frequency_penalty),
            ("provider.presence_penalty", provider.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                issues.push(ValidationIssue::OutOfRange {
                    field,
                    message: format!("{value} is outside -2.0..=2.0"),
                });
            }
        }

        if self.rewrite.concurrency == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "rewrite.concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.rewrite.kinds.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "rewrite.kinds",
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    OutOfRange { field: &'static str, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}

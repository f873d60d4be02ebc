use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
};

use jsonschema::{JSONSchema, ValidationError, error::ValidationErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{channel::Channel, error::DispatchError};

/// Schema version label such as `v1`, `2` or `1.10`.
///
/// Numeric components compare numerically, so `v2 < v10`. Labels that do not
/// parse as dotted numbers sort below every numeric label.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    label: String,
    components: Vec<u64>,
}

impl SchemaVersion {
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_string();
        let digits = label
            .strip_prefix('v')
            .or_else(|| label.strip_prefix('V'))
            .unwrap_or(&label);

        let components = digits
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_default();

        Self { label, components }
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components
            .cmp(&other.components)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SchemaVersion {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the payload, `""` for the payload root.
    pub path: String,
    pub reason: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    fn from_validation_error(error: &ValidationError<'_>) -> Self {
        let mut path = error.instance_path.to_string();

        let reason = match &error.kind {
            ValidationErrorKind::Required { property } => {
                let name = property
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| property.to_string());
                path.push('/');
                path.push_str(&name.replace('~', "~0").replace('/', "~1"));
                "missing required field".to_string()
            }
            _ => error.to_string(),
        };

        Self { path, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<Violation>,
    pub bypassed: bool,

    /// Contract version the payload was checked against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ValidationResult {
    pub fn checked(version: &SchemaVersion, violations: Vec<Violation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
            bypassed: false,
            version: Some(version.to_string()),
        }
    }

    pub fn bypassed() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
            bypassed: true,
            version: None,
        }
    }
}

/// A compiled JSON schema for one (channel, version) pair.
pub struct SchemaContract {
    channel: Channel,
    version: SchemaVersion,
    document: Value,
    compiled: JSONSchema,
}

impl SchemaContract {
    pub fn compile(
        channel: Channel,
        version: &str,
        document: Value,
    ) -> Result<Self, DispatchError> {
        let compiled = JSONSchema::compile(&document).map_err(|e| {
            DispatchError::configuration(format!(
                "invalid schema document for {}/{}: {}",
                channel, version, e
            ))
        })?;

        Ok(Self {
            channel,
            version: SchemaVersion::parse(version),
            document,
            compiled,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn version(&self) -> &SchemaVersion {
        &self.version
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn check(&self, payload: &Value) -> Vec<Violation> {
        match self.compiled.validate(payload) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| Violation::from_validation_error(&error))
                .collect(),
        }
    }
}

impl Debug for SchemaContract {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaContract")
            .field("channel", &self.channel)
            .field("version", &self.version.as_str())
            .finish_non_exhaustive()
    }
}

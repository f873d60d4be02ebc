use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use serde_json::Value;
use tracing::{debug, info};

use crate::models::{
    channel::Channel,
    error::DispatchError,
    schema::{SchemaContract, SchemaVersion},
};

const BUILTIN_SCHEMAS: &[(Channel, &str, &str)] = &[
    (Channel::Slack, "v1", include_str!("../../schemas/slack/v1.json")),
    (Channel::Slack, "v2", include_str!("../../schemas/slack/v2.json")),
    (Channel::Jira, "v1", include_str!("../../schemas/jira/v1.json")),
    (Channel::Email, "v1", include_str!("../../schemas/email/v1.json")),
    (Channel::Webhook, "v1", include_str!("../../schemas/webhook/v1.json")),
    (Channel::S3, "v1", include_str!("../../schemas/s3/v1.json")),
    (
        Channel::ServiceNow,
        "v1",
        include_str!("../../schemas/servicenow/v1.json"),
    ),
];

/// Read-only lookup of schema contracts by (channel, version).
///
/// Populated once at startup, then shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct SchemaStore {
    contracts: HashMap<Channel, BTreeMap<SchemaVersion, SchemaContract>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contracts compiled into the binary: v1 for every channel, v2 for Slack.
    pub fn builtin() -> Result<Self, DispatchError> {
        let mut store = Self::new();

        for (channel, version, source) in BUILTIN_SCHEMAS {
            let document = serde_json::from_str::<Value>(source).map_err(|e| {
                DispatchError::configuration(format!(
                    "built-in schema {}/{} is not valid JSON: {}",
                    channel, version, e
                ))
            })?;
            store.register(*channel, version, document)?;
        }

        Ok(store)
    }

    /// Adds every `{dir}/{channel}/{version}.json` file found under `dir`.
    ///
    /// Files override built-in contracts with the same version.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, DispatchError> {
        let read_dir = |path: &Path| {
            fs::read_dir(path).map_err(|e| {
                DispatchError::configuration(format!(
                    "cannot read schema directory {}: {}",
                    path.display(),
                    e
                ))
            })
        };

        let mut loaded = 0;

        for channel_entry in read_dir(dir)? {
            let channel_path = channel_entry
                .map_err(|e| DispatchError::configuration(e.to_string()))?
                .path();

            if !channel_path.is_dir() {
                continue;
            }

            let Some(channel) = channel_path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<Channel>().ok())
            else {
                debug!(path = %channel_path.display(), "Skipping non-channel schema directory");
                continue;
            };

            for version_entry in read_dir(&channel_path)? {
                let path = version_entry
                    .map_err(|e| DispatchError::configuration(e.to_string()))?
                    .path();

                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }

                let Some(version) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };

                let source = fs::read_to_string(&path).map_err(|e| {
                    DispatchError::configuration(format!(
                        "cannot read schema {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let document = serde_json::from_str::<Value>(&source).map_err(|e| {
                    DispatchError::configuration(format!(
                        "schema {} is not valid JSON: {}",
                        path.display(),
                        e
                    ))
                })?;

                self.register(channel, version, document)?;
                loaded += 1;
            }
        }

        info!(directory = %dir.display(), loaded, "Schema contracts loaded from disk");

        Ok(loaded)
    }

    pub fn register(
        &mut self,
        channel: Channel,
        version: &str,
        document: Value,
    ) -> Result<(), DispatchError> {
        let contract = SchemaContract::compile(channel, version, document)?;

        debug!(%channel, version, "Schema contract registered");

        self.contracts
            .entry(channel)
            .or_default()
            .insert(contract.version().clone(), contract);

        Ok(())
    }

    /// Resolves a contract, defaulting to the channel's latest version.
    ///
    /// A missing contract is a configuration error, never a validation failure.
    pub fn resolve(
        &self,
        channel: Channel,
        version: Option<&str>,
    ) -> Result<&SchemaContract, DispatchError> {
        let versions = self.contracts.get(&channel).ok_or_else(|| {
            DispatchError::configuration(format!("no schema contracts registered for {}", channel))
        })?;

        match version {
            Some(version) => versions.get(&SchemaVersion::parse(version)).ok_or_else(|| {
                DispatchError::configuration(format!(
                    "no schema contract {} registered for {}",
                    version, channel
                ))
            }),
            None => versions.values().next_back().ok_or_else(|| {
                DispatchError::configuration(format!(
                    "no schema contracts registered for {}",
                    channel
                ))
            }),
        }
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.contracts
            .get(&channel)
            .is_some_and(|versions| !versions.is_empty())
    }

    pub fn versions(&self, channel: Channel) -> Vec<String> {
        self.contracts
            .get(&channel)
            .map(|versions| versions.keys().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.values().map(BTreeMap::len).sum()
    }
}

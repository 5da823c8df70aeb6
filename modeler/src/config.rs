use modeler_annotation::{AnnotationGroup, GroupMeta, ModelAnnotation};
use modeler_model::{
    AnnotationKind, Dimension, Measure, ModelError, ModelerWorkspace, SharedDimension, SourceTable,
};
use modeler_store::{MetaStore, StoreError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::read_to_string;

const CONFIG_FILE_NAME: &str = "modeler.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found at: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown keys in group {group}: {}", .keys.join(", "))]
    UnknownGroupKeys { group: String, keys: Vec<String> },

    #[error("invalid annotation {id} in group {group}: {source}")]
    Annotation {
        group: String,
        id: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid seed model: {0}")]
    Seed(#[source] ModelError),

    #[error("failed to store shared dimension {name}: {source}")]
    SharedDimension {
        name: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigToml {
    source: SourceTable,
    #[serde(default)]
    model: SeedModel,
    #[serde(default)]
    shared_dimensions: BTreeMap<String, SharedDimension>,
    #[serde(default)]
    groups: Vec<GroupToml>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroupToml {
    #[serde(flatten)]
    meta: GroupMeta,
    #[serde(default)]
    annotations: Vec<AnnotationToml>,
    #[serde(flatten)]
    unknown: toml::Table,
}

/// An annotation entry: an id, and the payload's fields if it has one.
#[derive(Debug, Clone, Deserialize)]
struct AnnotationToml {
    id: String,
    #[serde(flatten)]
    payload: toml::Table,
}

/// Dimensions and measures the model starts out with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedModel {
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub source: SourceTable,
    pub model: SeedModel,
    pub shared_dimensions: BTreeMap<String, SharedDimension>,
    pub groups: Vec<AnnotationGroup<AnnotationKind>>,
}

impl Config {
    /// Load a config file. A directory resolves to the `modeler.toml` inside it.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path.to_owned()
        };
        let string = read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ConfigError::NotFound(path.clone()),
                _ => ConfigError::Read {
                    path: path.clone(),
                    source,
                },
            })?;
        Self::parse(path, &string)
    }

    pub fn parse(path: PathBuf, string: &str) -> Result<Self, ConfigError> {
        let config: ConfigToml = toml::from_str(string).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        let ConfigToml {
            source,
            model,
            shared_dimensions,
            groups,
        } = config;
        let groups = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| Self::build_group(index, group))
            .collect::<Result<_, _>>()?;
        Ok(Config {
            path,
            source,
            model,
            shared_dimensions,
            groups,
        })
    }

    /// A workspace over the configured table, with the seed model in place.
    pub fn workspace(&self) -> Result<ModelerWorkspace, ConfigError> {
        let mut workspace = ModelerWorkspace::new(self.source.clone());
        for dimension in &self.model.dimensions {
            workspace
                .insert_dimension(dimension.clone())
                .map_err(ConfigError::Seed)?;
        }
        for measure in &self.model.measures {
            workspace
                .insert_measure(measure.clone())
                .map_err(ConfigError::Seed)?;
        }
        Ok(workspace)
    }

    /// A metastore holding the configured shared dimensions.
    pub fn metastore(&self) -> Result<MetaStore, ConfigError> {
        let mut store = MetaStore::new();
        for (name, dimension) in &self.shared_dimensions {
            store
                .save(name, dimension)
                .map_err(|source| ConfigError::SharedDimension {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(store)
    }

    fn build_group(
        index: usize,
        group: GroupToml,
    ) -> Result<AnnotationGroup<AnnotationKind>, ConfigError> {
        let GroupToml {
            meta,
            annotations,
            unknown,
        } = group;
        let label = group_label(&meta, index);
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownGroupKeys {
                group: label,
                keys: unknown.into_iter().map(|(key, _)| key).collect(),
            });
        }
        let annotations = annotations
            .into_iter()
            .map(|AnnotationToml { id, payload }| {
                if payload.is_empty() {
                    return Ok(ModelAnnotation::empty(id));
                }
                let kind = toml::Value::Table(payload)
                    .try_into::<AnnotationKind>()
                    .map_err(|source| ConfigError::Annotation {
                        group: label.clone(),
                        id: id.clone(),
                        source,
                    })?;
                Ok(ModelAnnotation::new(id, kind))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(AnnotationGroup::with_annotations(meta, annotations))
    }
}

/// How a group is named in logs and errors: its name, else its id, else its
/// position in the config.
pub(crate) fn group_label(meta: &GroupMeta, index: usize) -> String {
    meta.name
        .clone()
        .or_else(|| meta.id.clone())
        .unwrap_or_else(|| format!("#{index}"))
}

mod config;

use modeler_annotation::{AnnotationId, ApplyError, ApplyReport, ApplyStatus};
use modeler_model::{AnnotationKind, ModelError, ModelerWorkspace};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::group_label;
pub use crate::config::{Config, ConfigError, SeedModel};

pub struct ApplyOptions {
    /// Config file, or a directory containing `modeler.toml`.
    pub config_path: PathBuf,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to apply group {group}: {source}")]
    Apply {
        group: String,
        #[source]
        source: ApplyError<ModelError>,
    },
}

/// What happened to the annotations of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub group: String,
    pub shared_dimension: bool,
    pub passes: usize,
    pub applied: Vec<AnnotationId>,
    pub failed: Vec<AnnotationId>,
    pub no_payload: Vec<AnnotationId>,
}

impl GroupSummary {
    fn from_report(
        group: String,
        shared_dimension: bool,
        report: &ApplyReport<'_, AnnotationKind>,
    ) -> Self {
        let ids = |status: ApplyStatus| -> Vec<AnnotationId> {
            report
                .get(status)
                .iter()
                .map(|annotation| annotation.id().clone())
                .collect()
        };
        Self {
            group,
            shared_dimension,
            passes: report.passes(),
            applied: ids(ApplyStatus::Applied),
            failed: ids(ApplyStatus::Failed),
            no_payload: ids(ApplyStatus::NoPayload),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplySummary {
    pub workspace: ModelerWorkspace,
    pub groups: Vec<GroupSummary>,
}

/// Load a config and apply each of its groups, in order, to one workspace.
pub async fn apply(options: ApplyOptions) -> Result<ApplySummary, AppError> {
    info!("starting");
    let ApplyOptions { config_path } = options;

    let config = Config::load(&config_path).await?;
    info!(config = %config.path.display(), "using config");

    apply_config(&config)
}

pub fn apply_config(config: &Config) -> Result<ApplySummary, AppError> {
    let mut workspace = config.workspace()?;
    let store = config.metastore()?;
    debug!("Workspace: {workspace:?}");

    let mut groups = Vec::with_capacity(config.groups.len());
    for (index, group) in config.groups.iter().enumerate() {
        let meta = group.meta();
        let label = group_label(meta, index);
        info!(group = %label, count = group.len(), "applying group");

        let report = group
            .apply_annotations(&mut workspace, &store)
            .map_err(|source| AppError::Apply {
                group: label.clone(),
                source,
            })?;

        for annotation in report.failed() {
            warn!(group = %label, "annotation failed: {annotation}");
        }

        groups.push(GroupSummary::from_report(
            label,
            meta.shared_dimension,
            &report,
        ));
    }

    info!("Apply completed");
    Ok(ApplySummary { workspace, groups })
}

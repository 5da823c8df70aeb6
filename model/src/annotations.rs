use modeler_annotation::Annotation;
use modeler_store::{Element, MetaStore};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use tracing::debug;

use crate::{AggregationType, Attribute, Dimension, Measure, ModelError, ModelerWorkspace};

/// Every annotation that can be made to a [`ModelerWorkspace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    CreateMeasure(CreateMeasure),
    CreateDimension(CreateDimension),
    CreateAttribute(CreateAttribute),
    UpdateMeasure(UpdateMeasure),
    LinkDimension(LinkDimension),
}

impl Annotation<ModelerWorkspace, MetaStore> for AnnotationKind {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        store: &MetaStore,
    ) -> Result<bool, ModelError> {
        match self {
            AnnotationKind::CreateMeasure(a) => a.apply(workspace, store),
            AnnotationKind::CreateDimension(a) => a.apply(workspace, store),
            AnnotationKind::CreateAttribute(a) => a.apply(workspace, store),
            AnnotationKind::UpdateMeasure(a) => a.apply(workspace, store),
            AnnotationKind::LinkDimension(a) => a.apply(workspace, store),
        }
    }
}

impl Display for AnnotationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::CreateMeasure(a) => Display::fmt(a, f),
            AnnotationKind::CreateDimension(a) => Display::fmt(a, f),
            AnnotationKind::CreateAttribute(a) => Display::fmt(a, f),
            AnnotationKind::UpdateMeasure(a) => Display::fmt(a, f),
            AnnotationKind::LinkDimension(a) => Display::fmt(a, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMeasure {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub aggregate: AggregationType,
    #[serde(default)]
    pub format_string: Option<String>,
}

impl Annotation<ModelerWorkspace, MetaStore> for CreateMeasure {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        _store: &MetaStore,
    ) -> Result<bool, ModelError> {
        workspace.insert_measure(Measure {
            name: self.name.clone(),
            column: self.column.clone(),
            aggregate: self.aggregate,
            format_string: self.format_string.clone(),
            description: None,
        })
    }
}

impl Display for CreateMeasure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create measure {} as {}({})",
            self.name, self.aggregate, self.column
        )
    }
}

/// Create a dimension with a single attribute of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDimension {
    pub name: String,
    pub column: String,
}

impl Annotation<ModelerWorkspace, MetaStore> for CreateDimension {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        _store: &MetaStore,
    ) -> Result<bool, ModelError> {
        workspace.insert_dimension(Dimension {
            name: self.name.clone(),
            attributes: vec![Attribute {
                name: self.name.clone(),
                column: self.column.clone(),
                description: None,
            }],
            shared_from: None,
        })
    }
}

impl Display for CreateDimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "create dimension {} on {}", self.name, self.column)
    }
}

/// Add an attribute to an existing dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAttribute {
    pub dimension: String,
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Annotation<ModelerWorkspace, MetaStore> for CreateAttribute {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        _store: &MetaStore,
    ) -> Result<bool, ModelError> {
        workspace.require_column(&self.column)?;
        let Some(dimension) = workspace.dimension_mut(&self.dimension) else {
            debug!(dimension = %self.dimension, "dimension not found");
            return Ok(false);
        };
        if dimension.attribute(&self.name).is_some() {
            return Ok(false);
        }
        dimension.attributes.push(Attribute {
            name: self.name.clone(),
            column: self.column.clone(),
            description: self.description.clone(),
        });
        Ok(true)
    }
}

impl Display for CreateAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create attribute {}.{} on {}",
            self.dimension, self.name, self.column
        )
    }
}

/// Change properties of an existing measure. Unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMeasure {
    pub measure: String,
    #[serde(default)]
    pub aggregate: Option<AggregationType>,
    #[serde(default)]
    pub format_string: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Annotation<ModelerWorkspace, MetaStore> for UpdateMeasure {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        _store: &MetaStore,
    ) -> Result<bool, ModelError> {
        let Some(measure) = workspace.measure_mut(&self.measure) else {
            debug!(measure = %self.measure, "measure not found");
            return Ok(false);
        };
        if let Some(aggregate) = self.aggregate {
            measure.aggregate = aggregate;
        }
        if let Some(format_string) = &self.format_string {
            measure.format_string = Some(format_string.clone());
        }
        if let Some(description) = &self.description {
            measure.description = Some(description.clone());
        }
        Ok(true)
    }
}

impl Display for UpdateMeasure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "update measure {}", self.measure)
    }
}

/// A dimension definition kept in the metastore, to be linked into models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedDimension {
    pub attributes: Vec<Attribute>,
}

impl Element for SharedDimension {
    const ELEMENT_TYPE: &'static str = "SharedDimension";
}

/// Create a dimension from a shared dimension in the metastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDimension {
    pub name: String,
    pub shared_dimension: String,
}

impl Annotation<ModelerWorkspace, MetaStore> for LinkDimension {
    type Error = ModelError;

    fn apply(
        &self,
        workspace: &mut ModelerWorkspace,
        store: &MetaStore,
    ) -> Result<bool, ModelError> {
        let Some(shared) = store.load::<SharedDimension>(&self.shared_dimension)? else {
            debug!(shared_dimension = %self.shared_dimension, "shared dimension not found");
            return Ok(false);
        };
        workspace.insert_dimension(Dimension {
            name: self.name.clone(),
            attributes: shared.attributes,
            shared_from: Some(self.shared_dimension.clone()),
        })
    }
}

impl Display for LinkDimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link dimension {} to shared {}",
            self.name, self.shared_dimension
        )
    }
}

use indexmap::IndexMap;
use modeler_annotation::AnnotationTarget;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::ModelError;

/// The physical table a model is built over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
}

impl SourceTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

impl Display for SourceTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    #[default]
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl Display for AggregationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Count => "count",
            AggregationType::CountDistinct => "count_distinct",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Name of the shared dimension this one was linked from.
    #[serde(default)]
    pub shared_from: Option<String>,
}

impl Dimension {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub aggregate: AggregationType,
    #[serde(default)]
    pub format_string: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalModel {
    dimensions: IndexMap<String, Dimension>,
    measures: IndexMap<String, Measure>,
}

impl LogicalModel {
    pub fn dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.values()
    }

    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.measures.is_empty()
    }
}

/// A logical model under construction, together with the table it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelerWorkspace {
    source: SourceTable,
    model: LogicalModel,
}

impl ModelerWorkspace {
    pub fn new(source: SourceTable) -> Self {
        Self {
            source,
            model: LogicalModel::default(),
        }
    }

    pub fn source(&self) -> &SourceTable {
        &self.source
    }

    pub fn model(&self) -> &LogicalModel {
        &self.model
    }

    pub fn require_column(&self, column: &str) -> Result<(), ModelError> {
        if self.source.has_column(column) {
            Ok(())
        } else {
            Err(ModelError::UnknownColumn {
                column: column.to_owned(),
                table: self.source.to_string(),
            })
        }
    }

    /// Add a dimension. Returns false if one with the same name exists.
    pub fn insert_dimension(&mut self, dimension: Dimension) -> Result<bool, ModelError> {
        for attribute in &dimension.attributes {
            self.require_column(&attribute.column)?;
        }
        if self.model.dimensions.contains_key(&dimension.name) {
            return Ok(false);
        }
        self.model
            .dimensions
            .insert(dimension.name.clone(), dimension);
        Ok(true)
    }

    /// Add a measure. Returns false if one with the same name exists.
    pub fn insert_measure(&mut self, measure: Measure) -> Result<bool, ModelError> {
        self.require_column(&measure.column)?;
        if self.model.measures.contains_key(&measure.name) {
            return Ok(false);
        }
        self.model.measures.insert(measure.name.clone(), measure);
        Ok(true)
    }

    pub fn dimension_mut(&mut self, name: &str) -> Option<&mut Dimension> {
        self.model.dimensions.get_mut(name)
    }

    pub fn measure_mut(&mut self, name: &str) -> Option<&mut Measure> {
        self.model.measures.get_mut(name)
    }
}

impl AnnotationTarget for ModelerWorkspace {
    fn has_members(&self) -> bool {
        !self.model.is_empty()
    }
}

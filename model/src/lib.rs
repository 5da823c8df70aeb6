//! A logical model over a single physical table, and the annotations that
//! shape it.

mod annotations;
mod workspace;

use displaydoc::Display;
use modeler_store::StoreError;
use thiserror::Error;

pub use crate::annotations::{
    AnnotationKind, CreateAttribute, CreateDimension, CreateMeasure, LinkDimension,
    SharedDimension, UpdateMeasure,
};
pub use crate::workspace::{
    AggregationType, Attribute, Dimension, LogicalModel, Measure, ModelerWorkspace, SourceTable,
};

/// Errors no further pass over a group can fix.
#[derive(Debug, Error, Display)]
pub enum ModelError {
    /// Column "{column}" not found in table "{table}"
    UnknownColumn { column: String, table: String },
    /// Metastore failed
    Store(#[from] StoreError),
}

//! Model annotations and the groups that apply them.
//!
//! An annotation is a single mutation of a target model. Annotations within a
//! group may depend on each other (a measure update needs the measure to
//! exist), but the dependencies are never declared: [`apply_annotations`]
//! retries the failures in further passes until no pass makes progress.

mod apply;
mod group;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use crate::apply::{ApplyError, ApplyReport, ApplyStatus, apply_annotations};
pub use crate::group::{AnnotationGroup, ColumnMapping, DataProvider, GroupMeta};

/// A concrete change an annotation makes to a target model.
///
/// Returning `Ok(false)` is an ordinary failure: a precondition isn't met
/// (yet), and the annotation may succeed on a later pass. `Err` is reserved
/// for failures no retry can fix; it aborts the whole group.
pub trait Annotation<Target: ?Sized, Store: ?Sized> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn apply(&self, target: &mut Target, store: &Store) -> Result<bool, Self::Error>;
}

/// A model annotations can be applied to.
pub trait AnnotationTarget {
    /// Whether the model has any dimensions or measures.
    fn has_members(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AnnotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An identified, possibly empty, annotation.
///
/// The payload is fixed at construction. An annotation without a payload is
/// legal: it is reported as [`ApplyStatus::NoPayload`] and never applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAnnotation<A> {
    id: AnnotationId,
    annotation: Option<A>,
}

impl<A> ModelAnnotation<A> {
    pub fn new(id: impl Into<AnnotationId>, annotation: A) -> Self {
        Self {
            id: id.into(),
            annotation: Some(annotation),
        }
    }

    pub fn empty(id: impl Into<AnnotationId>) -> Self {
        Self {
            id: id.into(),
            annotation: None,
        }
    }

    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    pub fn annotation(&self) -> Option<&A> {
        self.annotation.as_ref()
    }
}

impl<A: PartialEq> PartialEq for ModelAnnotation<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.annotation == other.annotation
    }
}

impl<A: Display> Display for ModelAnnotation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.annotation {
            Some(annotation) => write!(f, "{}: {annotation}", self.id),
            None => write!(f, "{}: <empty>", self.id),
        }
    }
}

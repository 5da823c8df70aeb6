use serde::{Deserialize, Serialize};

use crate::{Annotation, AnnotationId, AnnotationTarget, ApplyError, ApplyReport, ModelAnnotation};

/// Descriptive metadata of an annotation group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupMeta {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shared_dimension: bool,
    #[serde(default)]
    pub data_providers: Vec<DataProvider>,
}

impl PartialEq for GroupMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.shared_dimension == other.shared_dimension
            && self.data_providers == other.data_providers
    }
}

/// A physical table the annotations of a group were authored against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataProvider {
    pub name: String,
    #[serde(default)]
    pub schema_name: Option<String>,
    pub table_name: String,
    #[serde(default)]
    pub database_meta_name_ref: Option<String>,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub name: String,
    pub column_name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// An ordered group of annotations with its metadata.
///
/// Insertion order is the order annotations are attempted within a pass.
#[derive(Debug, Clone)]
pub struct AnnotationGroup<A> {
    meta: GroupMeta,
    annotations: Vec<ModelAnnotation<A>>,
}

impl<A> Default for AnnotationGroup<A> {
    fn default() -> Self {
        Self::new(GroupMeta::default())
    }
}

impl<A> AnnotationGroup<A> {
    pub fn new(meta: GroupMeta) -> Self {
        Self {
            meta,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(
        meta: GroupMeta,
        annotations: impl IntoIterator<Item = ModelAnnotation<A>>,
    ) -> Self {
        Self {
            meta,
            annotations: annotations.into_iter().collect(),
        }
    }

    pub fn meta(&self) -> &GroupMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut GroupMeta {
        &mut self.meta
    }

    pub fn annotations(&self) -> &[ModelAnnotation<A>] {
        &self.annotations
    }

    pub fn push(&mut self, annotation: ModelAnnotation<A>) {
        self.annotations.push(annotation);
    }

    /// Remove the first annotation with the given id.
    pub fn remove(&mut self, id: &AnnotationId) -> Option<ModelAnnotation<A>> {
        let index = self.annotations.iter().position(|a| a.id() == id)?;
        Some(self.annotations.remove(index))
    }

    /// Replace every annotation in the group. `None` leaves the group empty.
    pub fn set_annotations(&mut self, annotations: Option<Vec<ModelAnnotation<A>>>) {
        self.annotations.clear();
        if let Some(annotations) = annotations {
            self.annotations.extend(annotations);
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelAnnotation<A>> {
        self.annotations.iter()
    }

    /// Apply every annotation of this group to `target`.
    ///
    /// See [`crate::apply_annotations`].
    pub fn apply_annotations<'g, Target, Store>(
        &'g self,
        target: &mut Target,
        store: &Store,
    ) -> Result<ApplyReport<'g, A>, ApplyError<A::Error>>
    where
        A: Annotation<Target, Store>,
        Target: AnnotationTarget + ?Sized,
        Store: ?Sized,
    {
        crate::apply_annotations(self, target, store)
    }
}

impl<A: PartialEq> PartialEq for AnnotationGroup<A> {
    fn eq(&self, other: &Self) -> bool {
        if self.meta != other.meta || self.annotations.len() != other.annotations.len() {
            return false;
        }
        self.annotations
            .iter()
            .zip(other.annotations.iter())
            .all(|(a, b)| a == b)
    }
}

impl<'g, A> IntoIterator for &'g AnnotationGroup<A> {
    type Item = &'g ModelAnnotation<A>;
    type IntoIter = std::slice::Iter<'g, ModelAnnotation<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.annotations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> GroupMeta {
        GroupMeta {
            id: Some("g1".to_owned()),
            name: Some(name.to_owned()),
            description: Some("sales".to_owned()),
            shared_dimension: false,
            data_providers: vec![DataProvider {
                name: "sales".to_owned(),
                schema_name: Some("public".to_owned()),
                table_name: "sales".to_owned(),
                database_meta_name_ref: None,
                column_mappings: vec![ColumnMapping {
                    name: "Amount".to_owned(),
                    column_name: "amount".to_owned(),
                    data_type: Some("numeric".to_owned()),
                }],
            }],
        }
    }

    fn group(name: &str, payloads: &[&str]) -> AnnotationGroup<String> {
        AnnotationGroup::with_annotations(
            meta(name),
            payloads
                .iter()
                .enumerate()
                .map(|(i, p)| ModelAnnotation::new(format!("a{i}"), p.to_string())),
        )
    }

    #[test]
    fn equal_groups() {
        assert_eq!(group("g", &["x", "y"]), group("g", &["x", "y"]));
    }

    #[test]
    fn different_meta() {
        assert_ne!(group("g", &["x"]), group("h", &["x"]));

        let mut other = group("g", &["x"]);
        other.meta_mut().data_providers[0].column_mappings.clear();
        assert_ne!(group("g", &["x"]), other);
    }

    #[test]
    fn different_length() {
        assert_ne!(group("g", &["x", "y"]), group("g", &["x"]));
    }

    #[test]
    fn different_order() {
        assert_ne!(group("g", &["x", "y"]), group("g", &["y", "x"]));
    }

    #[test]
    fn empty_payload_is_not_equal_to_present_payload() {
        let a = AnnotationGroup::with_annotations(
            GroupMeta::default(),
            [ModelAnnotation::<String>::empty("a0")],
        );
        let b = AnnotationGroup::with_annotations(
            GroupMeta::default(),
            [ModelAnnotation::new("a0", "x".to_owned())],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn set_annotations_replaces_all() {
        let mut g = group("g", &["x", "y"]);
        g.set_annotations(Some(vec![ModelAnnotation::new("z", "z".to_owned())]));
        assert_eq!(g.len(), 1);
        assert_eq!(g.annotations()[0].id().as_str(), "z");

        g.set_annotations(None);
        assert!(g.is_empty());
    }

    #[test]
    fn push_appends_in_order() {
        let mut g = AnnotationGroup::new(meta("g"));
        assert!(g.is_empty());

        g.push(ModelAnnotation::new("b", "y".to_owned()));
        g.push(ModelAnnotation::<String>::empty("a"));
        g.push(ModelAnnotation::new("c", "x".to_owned()));

        assert_eq!(g.len(), 3);
        let ids: Vec<_> = g.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!(g.annotations()[1].annotation().is_none());
    }

    #[test]
    fn remove_by_id() {
        let mut g = group("g", &["x", "y", "z"]);
        let removed = g.remove(&AnnotationId::from("a1")).unwrap();
        assert_eq!(removed.annotation(), Some(&"y".to_owned()));
        let ids: Vec<_> = g.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(ids, vec!["a0", "a2"]);
        assert!(g.remove(&AnnotationId::from("missing")).is_none());
    }
}

use displaydoc::Display;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{Annotation, AnnotationGroup, AnnotationId, AnnotationTarget, ModelAnnotation};

/// The final outcome of a single annotation within a group.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyStatus {
    /// applied
    Applied,
    /// failed
    Failed,
    /// no payload
    NoPayload,
}

impl ApplyStatus {
    pub const ALL: [ApplyStatus; 3] = [
        ApplyStatus::Applied,
        ApplyStatus::Failed,
        ApplyStatus::NoPayload,
    ];
}

#[derive(Error, Debug)]
pub enum ApplyError<E> {
    #[error("annotation {id} failed to apply: {source}")]
    Annotation {
        id: AnnotationId,
        #[source]
        source: E,
    },
}

/// Annotations of a group partitioned by [`ApplyStatus`].
///
/// Within a bucket annotations are in the order their outcome was decided,
/// so first-pass outcomes come before later-pass ones.
#[derive(Debug)]
pub struct ApplyReport<'g, A> {
    buckets: IndexMap<ApplyStatus, Vec<&'g ModelAnnotation<A>>>,
    passes: usize,
}

impl<'g, A> ApplyReport<'g, A> {
    /// A report without any buckets, for a model nothing was applied to.
    fn empty() -> Self {
        Self {
            buckets: IndexMap::new(),
            passes: 0,
        }
    }

    fn new() -> Self {
        Self {
            buckets: ApplyStatus::ALL
                .into_iter()
                .map(|status| (status, Vec::new()))
                .collect(),
            passes: 0,
        }
    }

    fn push(&mut self, status: ApplyStatus, annotation: &'g ModelAnnotation<A>) {
        self.buckets.entry(status).or_default().push(annotation);
    }

    pub fn get(&self, status: ApplyStatus) -> &[&'g ModelAnnotation<A>] {
        self.buckets
            .get(&status)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn applied(&self) -> &[&'g ModelAnnotation<A>] {
        self.get(ApplyStatus::Applied)
    }

    pub fn failed(&self) -> &[&'g ModelAnnotation<A>] {
        self.get(ApplyStatus::Failed)
    }

    pub fn no_payload(&self) -> &[&'g ModelAnnotation<A>] {
        self.get(ApplyStatus::NoPayload)
    }

    /// The status an annotation ended up with, if it is in this report.
    pub fn status_of(&self, id: &AnnotationId) -> Option<ApplyStatus> {
        self.buckets.iter().find_map(|(status, annotations)| {
            annotations
                .iter()
                .any(|annotation| annotation.id() == id)
                .then_some(*status)
        })
    }

    /// Number of passes made over the group.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Total number of annotations across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApplyStatus, &[&'g ModelAnnotation<A>])> {
        self.buckets
            .iter()
            .map(|(status, annotations)| (*status, annotations.as_slice()))
    }
}

/// Apply every annotation of `group` to `target`, retrying failures until a
/// pass makes no progress.
///
/// Each pass walks the remaining annotations in group order:
/// - an annotation without a payload is reported as `NoPayload`, untouched;
/// - an annotation that applies is reported as `Applied`;
/// - the rest are kept for the next pass.
///
/// A pass that leaves every remaining annotation failing ends the run, and
/// those annotations are reported as `Failed`. Every further pass has strictly
/// fewer annotations, so a group of n annotations takes at most n passes.
///
/// If the model has no dimensions and no measures, nothing is applied and the
/// report is empty.
///
/// An annotation returning an error aborts the run and the error is returned.
pub fn apply_annotations<'g, A, Target, Store>(
    group: &'g AnnotationGroup<A>,
    target: &mut Target,
    store: &Store,
) -> Result<ApplyReport<'g, A>, ApplyError<A::Error>>
where
    A: Annotation<Target, Store>,
    Target: AnnotationTarget + ?Sized,
    Store: ?Sized,
{
    if !target.has_members() {
        info!(
            count = group.len(),
            "model has no dimensions or measures, skipping annotations"
        );
        return Ok(ApplyReport::empty());
    }

    let mut report = ApplyReport::new();
    let mut pending: Vec<&'g ModelAnnotation<A>> = group.iter().collect();

    while !pending.is_empty() {
        report.passes += 1;
        let before = pending.len();
        let mut still_failing = Vec::new();

        for model_annotation in pending {
            let Some(annotation) = model_annotation.annotation() else {
                debug!(annotation = %model_annotation.id(), "no payload");
                report.push(ApplyStatus::NoPayload, model_annotation);
                continue;
            };

            let applied = annotation.apply(target, store).map_err(|source| {
                ApplyError::Annotation {
                    id: model_annotation.id().clone(),
                    source,
                }
            })?;

            if applied {
                debug!(annotation = %model_annotation.id(), "applied");
                report.push(ApplyStatus::Applied, model_annotation);
            } else {
                still_failing.push(model_annotation);
            }
        }

        debug!(
            pass = report.passes,
            attempted = before,
            failing = still_failing.len(),
            "pass complete"
        );

        if still_failing.len() == before {
            warn!(
                count = still_failing.len(),
                "no progress, giving up on remaining annotations"
            );
            for model_annotation in still_failing {
                report.push(ApplyStatus::Failed, model_annotation);
            }
            break;
        }

        pending = still_failing;
    }

    info!(
        passes = report.passes,
        applied = report.applied().len(),
        failed = report.failed().len(),
        no_payload = report.no_payload().len(),
        "annotations applied"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupMeta;

    #[derive(Debug, Clone)]
    struct Model {
        members: Vec<&'static str>,
        calls: usize,
    }

    impl Model {
        fn seeded() -> Self {
            Self {
                members: vec!["seed"],
                calls: 0,
            }
        }
    }

    impl AnnotationTarget for Model {
        fn has_members(&self) -> bool {
            !self.members.is_empty()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Step {
        Add(&'static str),
        AddAfter {
            name: &'static str,
            needs: &'static str,
        },
        Never,
        Explode,
    }

    #[derive(Debug, Error)]
    #[error("exploded")]
    struct Exploded;

    impl Annotation<Model, ()> for Step {
        type Error = Exploded;

        fn apply(&self, model: &mut Model, _store: &()) -> Result<bool, Self::Error> {
            model.calls += 1;
            match self {
                Step::Add(name) => {
                    model.members.push(*name);
                    Ok(true)
                }
                Step::AddAfter { name, needs } => {
                    if model.members.contains(needs) {
                        model.members.push(*name);
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                }
                Step::Never => Ok(false),
                Step::Explode => Err(Exploded),
            }
        }
    }

    fn group(steps: Vec<(&str, Option<Step>)>) -> AnnotationGroup<Step> {
        AnnotationGroup::with_annotations(
            GroupMeta::default(),
            steps.into_iter().map(|(id, step)| match step {
                Some(step) => ModelAnnotation::new(id, step),
                None => ModelAnnotation::empty(id),
            }),
        )
    }

    fn ids(annotations: &[&ModelAnnotation<Step>]) -> Vec<String> {
        annotations.iter().map(|a| a.id().to_string()).collect()
    }

    #[test]
    fn all_applied_in_one_pass() {
        let g = group(vec![
            ("a", Some(Step::Add("a"))),
            ("b", Some(Step::Add("b"))),
            ("c", Some(Step::Add("c"))),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 1);
        assert_eq!(ids(report.applied()), vec!["a", "b", "c"]);
        assert!(report.failed().is_empty());
        assert!(report.no_payload().is_empty());
        assert_eq!(model.calls, 3);
    }

    #[test]
    fn dependency_resolves_on_later_pass() {
        let g = group(vec![
            (
                "a",
                Some(Step::AddAfter {
                    name: "a",
                    needs: "b",
                }),
            ),
            ("b", Some(Step::Add("b"))),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 2);
        assert_eq!(ids(report.applied()), vec!["b", "a"]);
        assert!(report.failed().is_empty());
    }

    #[test]
    fn reversed_chain_takes_one_pass_per_link() {
        let g = group(vec![
            ("d", Some(Step::AddAfter { name: "d", needs: "c" })),
            ("c", Some(Step::AddAfter { name: "c", needs: "b" })),
            ("b", Some(Step::AddAfter { name: "b", needs: "a" })),
            ("a", Some(Step::Add("a"))),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 4);
        assert_eq!(ids(report.applied()), vec!["a", "b", "c", "d"]);
        assert!(report.failed().is_empty());
        // 4 + 3 + 2 + 1 attempts
        assert_eq!(model.calls, 10);
    }

    #[test]
    fn never_applied_fails_without_retry() {
        let g = group(vec![
            ("a", Some(Step::Never)),
            ("b", Some(Step::Never)),
            ("c", Some(Step::Never)),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 1);
        assert_eq!(ids(report.failed()), vec!["a", "b", "c"]);
        assert!(report.applied().is_empty());
        assert_eq!(model.calls, 3);
    }

    #[test]
    fn failures_after_progress_stop_at_fixpoint() {
        let g = group(vec![
            ("never", Some(Step::Never)),
            (
                "missing",
                Some(Step::AddAfter {
                    name: "m",
                    needs: "nothing",
                }),
            ),
            ("x", Some(Step::Add("x"))),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 2);
        assert_eq!(ids(report.applied()), vec!["x"]);
        assert_eq!(ids(report.failed()), vec!["never", "missing"]);
        assert!(report.passes() <= g.len());
    }

    #[test]
    fn no_payload_on_first_pass_wherever_it_is() {
        let g = group(vec![
            ("never", Some(Step::Never)),
            ("empty-1", None),
            ("x", Some(Step::Add("x"))),
            ("empty-2", None),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(ids(report.no_payload()), vec!["empty-1", "empty-2"]);
        assert_eq!(ids(report.applied()), vec!["x"]);
        assert_eq!(ids(report.failed()), vec!["never"]);
        // never twice, x once, empty ones not at all
        assert_eq!(model.calls, 3);
    }

    #[test]
    fn only_empty_annotations() {
        let g = group(vec![("a", None), ("b", None)]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.passes(), 1);
        assert_eq!(ids(report.no_payload()), vec!["a", "b"]);
        assert_eq!(model.calls, 0);
    }

    #[test]
    fn buckets_partition_the_group() {
        let g = group(vec![
            ("a", Some(Step::AddAfter { name: "a", needs: "c" })),
            ("b", None),
            ("c", Some(Step::Add("c"))),
            ("d", Some(Step::Never)),
            ("e", Some(Step::AddAfter { name: "e", needs: "a" })),
            ("f", None),
        ]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert_eq!(report.len(), g.len());
        for annotation in g.iter() {
            let count = report
                .iter()
                .flat_map(|(_, annotations)| annotations.iter())
                .filter(|a| a.id() == annotation.id())
                .count();
            assert_eq!(count, 1, "{} must be in exactly one bucket", annotation.id());
        }
        assert_eq!(
            report.status_of(&AnnotationId::from("e")),
            Some(ApplyStatus::Applied)
        );
        assert_eq!(
            report.status_of(&AnnotationId::from("d")),
            Some(ApplyStatus::Failed)
        );
        assert_eq!(
            report.status_of(&AnnotationId::from("f")),
            Some(ApplyStatus::NoPayload)
        );
    }

    #[test]
    fn empty_model_is_skipped() {
        let g = group(vec![("a", Some(Step::Add("a"))), ("b", None)]);
        let mut model = Model {
            members: Vec::new(),
            calls: 0,
        };
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert!(report.is_empty());
        assert_eq!(report.passes(), 0);
        assert!(report.no_payload().is_empty());
        assert_eq!(model.calls, 0);
        assert!(model.members.is_empty());
    }

    #[test]
    fn empty_group() {
        let g = group(vec![]);
        let mut model = Model::seeded();
        let report = g.apply_annotations(&mut model, &()).unwrap();

        assert!(report.is_empty());
        assert_eq!(report.passes(), 0);
        assert_eq!(report.iter().count(), 3);
    }

    #[test]
    fn error_aborts_the_run() {
        let g = group(vec![
            ("x", Some(Step::Add("x"))),
            ("boom", Some(Step::Explode)),
            ("y", Some(Step::Add("y"))),
        ]);
        let mut model = Model::seeded();
        let error = g.apply_annotations(&mut model, &()).unwrap_err();

        let ApplyError::Annotation { id, .. } = &error;
        assert_eq!(id.as_str(), "boom");
        assert_eq!(error.to_string(), "annotation boom failed to apply: exploded");
        assert_eq!(model.members, vec!["seed", "x"]);
    }

    #[test]
    fn error_on_retry_pass_aborts_the_run() {
        #[derive(Debug, Clone, PartialEq)]
        struct ExplodeAfter(&'static str);

        impl Annotation<Model, ()> for ExplodeAfter {
            type Error = Exploded;

            fn apply(&self, model: &mut Model, _store: &()) -> Result<bool, Self::Error> {
                if model.members.contains(&self.0) {
                    Err(Exploded)
                } else {
                    model.members.push(self.0);
                    Ok(self.0 == "first")
                }
            }
        }

        let g = AnnotationGroup::with_annotations(
            GroupMeta::default(),
            [
                ModelAnnotation::new("retry", ExplodeAfter("second")),
                ModelAnnotation::new("first", ExplodeAfter("first")),
            ],
        );
        let mut model = Model::seeded();
        let error = g.apply_annotations(&mut model, &()).unwrap_err();

        let ApplyError::Annotation { id, .. } = error;
        assert_eq!(id.as_str(), "retry");
    }

    #[test]
    fn same_outcome_on_fresh_models() {
        let g = group(vec![
            ("a", Some(Step::AddAfter { name: "a", needs: "b" })),
            ("n", None),
            ("b", Some(Step::Add("b"))),
            ("z", Some(Step::Never)),
        ]);
        let model = Model::seeded();

        let mut first_model = model.clone();
        let first = g.apply_annotations(&mut first_model, &()).unwrap();
        let mut second_model = model.clone();
        let second = g.apply_annotations(&mut second_model, &()).unwrap();

        for status in ApplyStatus::ALL {
            assert_eq!(ids(first.get(status)), ids(second.get(status)));
        }
        assert_eq!(first.passes(), second.passes());
        assert_eq!(first_model.members, second_model.members);
    }
}

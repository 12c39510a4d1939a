//! Pure component sequencing.
//!
//! Given a study's components and the component a run is at, decide where the
//! run goes next. Components are ordered by their persisted `position`;
//! inactive components are skipped. The current component itself may be
//! inactive (it was deactivated while the run was on it), in which case the
//! scan continues from its position.

use crate::entities::Component;

/// Outcome of a sequencing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    /// The run moves to this component.
    Component(&'a Component),
    /// There is no active component after the current one.
    EndOfStudy,
    /// There is no active component before the current one.
    StartOfStudy,
    /// The current component is not part of this study.
    NotFound,
}

/// Walks a study's components in order.
#[derive(Debug, Clone)]
pub struct ComponentSequencer<'a> {
    ordered: Vec<&'a Component>,
}

impl<'a> ComponentSequencer<'a> {
    #[must_use]
    pub fn new(components: &'a [Component]) -> Self {
        let mut ordered: Vec<&Component> = components.iter().collect();
        ordered.sort_by_key(|c| c.position);
        Self { ordered }
    }

    /// The first active component, or `None` for a structurally empty study.
    #[must_use]
    pub fn first(&self) -> Option<&'a Component> {
        self.active().next()
    }

    /// The next active component after `current_id`.
    #[must_use]
    pub fn next(&self, current_id: &str) -> Step<'a> {
        let Some(idx) = self.index_of(current_id) else {
            return Step::NotFound;
        };
        self.ordered[idx + 1..]
            .iter()
            .copied()
            .find(|c| c.active)
            .map_or(Step::EndOfStudy, Step::Component)
    }

    /// The closest active component before `current_id`.
    #[must_use]
    pub fn previous(&self, current_id: &str) -> Step<'a> {
        let Some(idx) = self.index_of(current_id) else {
            return Step::NotFound;
        };
        self.ordered[..idx]
            .iter()
            .rev()
            .copied()
            .find(|c| c.active)
            .map_or(Step::StartOfStudy, Step::Component)
    }

    /// The active component at zero-based `index` among active components.
    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&'a Component> {
        self.active().nth(index)
    }

    /// Look up any component of the study, active or not.
    #[must_use]
    pub fn get(&self, component_id: &str) -> Option<&'a Component> {
        self.index_of(component_id).map(|idx| self.ordered[idx])
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    fn active(&self) -> impl Iterator<Item = &'a Component> + '_ {
        self.ordered.iter().copied().filter(|c| c.active)
    }

    fn index_of(&self, component_id: &str) -> Option<usize> {
        self.ordered.iter().position(|c| c.id == component_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn component(id: &str, position: u32, active: bool) -> Component {
        let now = Utc::now();
        Component {
            id: id.into(),
            study_id: "stu-00000001".into(),
            position,
            title: id.to_uppercase(),
            active,
            reloadable: false,
            payload: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn abc_with_b_inactive() -> Vec<Component> {
        vec![
            component("c", 3, true),
            component("a", 1, true),
            component("b", 2, false),
        ]
    }

    #[test]
    fn first_skips_inactive() {
        let components = vec![component("a", 1, false), component("b", 2, true)];
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.first().unwrap().id, "b");
    }

    #[test]
    fn first_is_none_without_active_components() {
        let components = vec![component("a", 1, false)];
        assert!(ComponentSequencer::new(&components).first().is_none());
        assert!(ComponentSequencer::new(&[]).first().is_none());
    }

    #[test]
    fn next_skips_inactive() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.first().unwrap().id, "a");
        match seq.next("a") {
            Step::Component(c) => assert_eq!(c.id, "c"),
            other => panic!("expected component c, got {other:?}"),
        }
    }

    #[test]
    fn next_after_last_is_end_of_study() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.next("c"), Step::EndOfStudy);
    }

    #[test]
    fn next_from_deactivated_current_continues_in_order() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        match seq.next("b") {
            Step::Component(c) => assert_eq!(c.id, "c"),
            other => panic!("expected component c, got {other:?}"),
        }
    }

    #[test]
    fn unknown_current_is_not_found() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.next("zzz"), Step::NotFound);
        assert_eq!(seq.previous("zzz"), Step::NotFound);
    }

    #[test]
    fn previous_skips_inactive_and_stops_at_start() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        match seq.previous("c") {
            Step::Component(c) => assert_eq!(c.id, "a"),
            other => panic!("expected component a, got {other:?}"),
        }
        assert_eq!(seq.previous("a"), Step::StartOfStudy);
    }

    #[test]
    fn by_index_counts_active_only() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.by_index(0).unwrap().id, "a");
        assert_eq!(seq.by_index(1).unwrap().id, "c");
        assert!(seq.by_index(2).is_none());
        assert_eq!(seq.active_count(), 2);
    }

    #[test]
    fn get_finds_inactive_components() {
        let components = abc_with_b_inactive();
        let seq = ComponentSequencer::new(&components);
        assert_eq!(seq.get("b").unwrap().position, 2);
        assert!(seq.get("nope").is_none());
    }
}

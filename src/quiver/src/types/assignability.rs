//! Matching rules between a requested type and the types a component exposes.

use super::hierarchy::within_bounds;
use super::Type;

pub trait AssignabilityRules {
    /// Returns whether `candidate` satisfies `target`.
    fn matches_single(&self, target: &Type, candidate: &Type) -> bool;

    fn matches(&self, target: &Type, candidates: &[Type]) -> bool {
        candidates
            .iter()
            .any(|candidate| self.matches_single(target, candidate))
    }
}

/// Rules for matching a required type against a bean type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeanTypeRules;

impl AssignabilityRules for BeanTypeRules {
    fn matches_single(&self, required: &Type, bean: &Type) -> bool {
        match (required, bean) {
            (Type::Class(a), Type::Class(b)) => a == b,
            (Type::Parameterized { class: a, .. }, Type::Class(b)) => a == b,
            (Type::Class(a), Type::Parameterized { class: b, args }) => {
                a == b && args.iter().all(Type::is_unbounded_variable)
            }
            (
                Type::Parameterized { class: a, args: required_args },
                Type::Parameterized { class: b, args: bean_args },
            ) => {
                a == b
                    && required_args.len() == bean_args.len()
                    && required_args
                        .iter()
                        .zip(bean_args)
                        .all(|(r, b)| self.parameters_match(r, b))
            }
            _ => required == bean,
        }
    }
}

impl BeanTypeRules {
    fn parameters_match(&self, required: &Type, bean: &Type) -> bool {
        match (required, bean) {
            (Type::Wildcard { upper, lower }, Type::Variable { bounds, .. }) => {
                wildcard_accepts_variable(upper, lower, bounds)
            }
            (Type::Wildcard { upper, lower }, _) if is_actual(bean) => {
                within_bounds(bean, upper, lower)
            }
            (Type::Variable { bounds: required_bounds, .. }, Type::Variable { bounds, .. }) => {
                bounds.iter().all(|bound| {
                    required_bounds
                        .iter()
                        .any(|required_bound| required_bound.is_subtype_of(bound))
                })
            }
            (_, Type::Variable { bounds, .. }) if is_actual(required) => {
                within_bounds(required, bounds, &[])
            }
            _ if is_actual(required) && is_actual(bean) => self.matches_single(required, bean),
            _ => false,
        }
    }
}

/// Rules for matching an observed type against one type of an event's
/// type closure.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTypeRules;

impl AssignabilityRules for EventTypeRules {
    fn matches_single(&self, observed: &Type, event: &Type) -> bool {
        match (observed, event) {
            (Type::Class(a), Type::Class(b)) => a == b,
            (Type::Class(a), Type::Parameterized { class: b, .. }) => a == b,
            (Type::Parameterized { class: a, .. }, Type::Class(b)) => a == b,
            (
                Type::Parameterized { class: a, args: observed_args },
                Type::Parameterized { class: b, args: event_args },
            ) => {
                a == b
                    && observed_args.len() == event_args.len()
                    && observed_args
                        .iter()
                        .zip(event_args)
                        .all(|(o, e)| self.parameters_match(o, e))
            }
            (Type::Variable { bounds, .. }, _) if is_actual(event) => {
                within_bounds(event, bounds, &[])
            }
            _ => false,
        }
    }
}

impl EventTypeRules {
    fn parameters_match(&self, observed: &Type, event: &Type) -> bool {
        match (observed, event) {
            (
                Type::Wildcard { upper, lower },
                Type::Wildcard {
                    upper: event_upper,
                    lower: event_lower,
                },
            ) => {
                upper
                    .iter()
                    .all(|bound| event_upper.iter().any(|e| e.is_subtype_of(bound)))
                    && lower
                        .iter()
                        .all(|bound| event_lower.iter().any(|e| bound.is_subtype_of(e)))
            }
            (Type::Wildcard { upper, lower }, _) if is_actual(event) => {
                within_bounds(event, upper, lower)
            }
            (Type::Variable { bounds, .. }, _) if is_actual(event) => {
                within_bounds(event, bounds, &[])
            }
            _ if is_actual(observed) && is_actual(event) => self.matches_single(observed, event),
            _ => false,
        }
    }
}

fn is_actual(ty: &Type) -> bool {
    matches!(ty, Type::Class(_) | Type::Parameterized { .. })
}

/// A wildcard accepts a variable when the variable's upper bound is related
/// to the wildcard's upper bound and lies above its lower bound.
fn wildcard_accepts_variable(upper: &[Type], lower: &[Type], bounds: &[Type]) -> bool {
    let upper_ok = bounds.is_empty()
        || upper.iter().all(|wildcard_bound| {
            bounds.iter().any(|variable_bound| {
                variable_bound.is_subtype_of(wildcard_bound)
                    || wildcard_bound.is_subtype_of(variable_bound)
            })
        });
    let lower_ok = lower.iter().all(|wildcard_bound| {
        bounds
            .iter()
            .all(|variable_bound| wildcard_bound.is_subtype_of(variable_bound))
    });
    upper_ok && lower_ok
}

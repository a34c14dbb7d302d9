//! Type closure and subtyping over the explicit [`Type`] model.

use super::{Class, Type};

impl Type {
    /// Returns this type followed by all its transitive supertypes, without
    /// duplicates and in discovery order.
    ///
    /// Walking a parameterized type substitutes its arguments into the
    /// supertypes of its class. Walking a raw generic class erases the
    /// supertypes to their raw classes.
    pub fn closure(&self) -> Vec<Type> {
        let mut out = Vec::new();
        collect_closure(self, &mut out);
        out
    }

    /// Replaces type variables bound in `bindings`.
    pub fn substitute(&self, bindings: &[(&'static str, Type)]) -> Type {
        match self {
            Type::Class(_) => self.clone(),
            Type::Parameterized { class, args } => Type::Parameterized {
                class: class.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Type::Wildcard { upper, lower } => Type::Wildcard {
                upper: upper.iter().map(|ty| ty.substitute(bindings)).collect(),
                lower: lower.iter().map(|ty| ty.substitute(bindings)).collect(),
            },
            Type::Variable { name, .. } => bindings
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, ty)| ty.clone())
                .unwrap_or_else(|| self.clone()),
        }
    }

    /// Erases a parameterized type to its raw class.
    pub fn erase(&self) -> Type {
        match self {
            Type::Parameterized { class, .. } => Type::Class(class.clone()),
            _ => self.clone(),
        }
    }

    /// Returns whether some part of this type is still unresolved.
    ///
    /// A raw generic class counts as unresolved since its parameters are
    /// unknown.
    pub fn contains_type_variable(&self) -> bool {
        match self {
            Type::Class(class) => class.is_generic(),
            Type::Parameterized { args, .. } => args.iter().any(Type::contains_type_variable),
            Type::Wildcard { upper, lower } => upper
                .iter()
                .chain(lower.iter())
                .any(Type::contains_type_variable),
            Type::Variable { .. } => true,
        }
    }

    /// Returns whether `self` can be used where `sup` is expected.
    pub fn is_subtype_of(&self, sup: &Type) -> bool {
        match sup {
            Type::Variable { bounds, .. } => bounds.iter().all(|bound| self.is_subtype_of(bound)),
            Type::Wildcard { upper, lower } => within_bounds(self, upper, lower),
            _ => self
                .closure()
                .iter()
                .any(|candidate| contains_argument_of(sup, candidate)),
        }
    }
}

fn collect_closure(ty: &Type, out: &mut Vec<Type>) {
    if out.contains(ty) {
        return;
    }
    out.push(ty.clone());

    match ty {
        Type::Class(class) => {
            let generic = class.is_generic();
            for supertype in class.supertypes() {
                if generic {
                    collect_closure(&supertype.erase(), out);
                } else {
                    collect_closure(supertype, out);
                }
            }
        }
        Type::Parameterized { class, args } => {
            let bindings = bindings_of(class, args);
            for supertype in class.supertypes() {
                collect_closure(&supertype.substitute(&bindings), out);
            }
        }
        Type::Wildcard { upper, .. } => {
            for bound in upper {
                collect_closure(bound, out);
            }
        }
        Type::Variable { bounds, .. } => {
            for bound in bounds {
                collect_closure(bound, out);
            }
        }
    }
}

fn bindings_of(class: &Class, args: &[Type]) -> Vec<(&'static str, Type)> {
    class
        .params()
        .iter()
        .copied()
        .zip(args.iter().cloned())
        .collect()
}

/// Structural equality where wildcard and variable arguments of `sup` accept
/// any argument of `sub` within their bounds.
fn contains_argument_of(sup: &Type, sub: &Type) -> bool {
    match (sup, sub) {
        (Type::Class(a), Type::Class(b)) => a == b,
        (
            Type::Parameterized { class: a, args: sup_args },
            Type::Parameterized { class: b, args: sub_args },
        ) => {
            a == b
                && sup_args.len() == sub_args.len()
                && sup_args
                    .iter()
                    .zip(sub_args)
                    .all(|(sup_arg, sub_arg)| contains_argument_of(sup_arg, sub_arg))
        }
        (Type::Wildcard { upper, lower }, _) => within_bounds(sub, upper, lower),
        (Type::Variable { bounds, .. }, _) => within_bounds(sub, bounds, &[]),
        _ => false,
    }
}

/// Returns whether `ty` lies between every lower bound and every upper bound.
pub fn within_bounds(ty: &Type, upper: &[Type], lower: &[Type]) -> bool {
    upper.iter().all(|bound| ty.is_subtype_of(bound))
        && lower.iter().all(|bound| bound.is_subtype_of(ty))
}

/// Concretizes a runtime type that still has unresolved parameters from a
/// declared type.
///
/// The declared type's closure is first searched for a fully resolved
/// parameterization of the runtime type's raw class. Failing that, the
/// parameters of the runtime class are bound by matching its own supertypes
/// against the declared type's closure. Returns `None` when some parameter
/// stays unbound or is bound inconsistently.
pub fn resolve_runtime_type(runtime: &Type, declared: &Type) -> Option<Type> {
    if !runtime.contains_type_variable() {
        return Some(runtime.clone());
    }
    let class = runtime.raw_class()?;
    let declared_closure = declared.closure();
    if let Some(found) = resolved_parameterization(&declared_closure, class) {
        return Some(found.clone());
    }

    let generic = match runtime {
        Type::Class(class) => {
            class.parameterized(class.params().iter().map(|&param| Type::variable(param)))
        }
        _ => runtime.clone(),
    };
    let mut bindings = Vec::new();
    for supertype in generic.closure() {
        let Type::Parameterized { class: raw, .. } = &supertype else {
            continue;
        };
        if let Some(concrete) = resolved_parameterization(&declared_closure, raw) {
            if !unify(&supertype, concrete, &mut bindings) {
                return None;
            }
        }
    }

    let resolved = generic.substitute(&bindings);
    (!resolved.contains_type_variable()).then_some(resolved)
}

fn resolved_parameterization<'a>(closure: &'a [Type], class: &Class) -> Option<&'a Type> {
    closure.iter().find(|candidate| {
        matches!(candidate, Type::Parameterized { class: c, .. } if c == class)
            && !candidate.contains_type_variable()
    })
}

/// Binds the type variables of `generic` so that it matches `concrete`.
/// Returns false if a variable would be bound to two different types.
fn unify(generic: &Type, concrete: &Type, bindings: &mut Vec<(&'static str, Type)>) -> bool {
    match (generic, concrete) {
        (Type::Variable { name, .. }, _) => {
            match bindings.iter().find(|(param, _)| param == name) {
                Some((_, bound)) => bound == concrete,
                None => {
                    bindings.push((*name, concrete.clone()));
                    true
                }
            }
        }
        (
            Type::Parameterized { class: a, args: generic_args },
            Type::Parameterized { class: b, args: concrete_args },
        ) if a == b && generic_args.len() == concrete_args.len() => generic_args
            .iter()
            .zip(concrete_args)
            .all(|(generic_arg, concrete_arg)| unify(generic_arg, concrete_arg, bindings)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animal() -> Class {
        Class::named("Animal")
    }

    fn dog() -> Class {
        Class::named("Dog").extends(animal())
    }

    fn collection() -> Class {
        Class::named("Collection").with_params(["E"])
    }

    fn list() -> Class {
        Class::named("List")
            .with_params(["T"])
            .extends(collection().parameterized([Type::variable("T")]))
    }

    #[test]
    fn type_closure_succeeds() {
        let closure = Type::from(dog()).closure();
        assert_eq!(closure, vec![Type::from(dog()), Type::from(animal())]);
    }

    #[test]
    fn type_closure_succeeds_when_type_is_parameterized() {
        let ty = list().parameterized([Type::from(dog())]);
        let closure = ty.closure();
        assert_eq!(
            closure,
            vec![ty.clone(), collection().parameterized([Type::from(dog())])]
        );
    }

    #[test]
    fn type_closure_erases_supertypes_when_class_is_raw_generic() {
        let closure = Type::from(list()).closure();
        assert_eq!(closure, vec![Type::from(list()), Type::from(collection())]);
    }

    #[test]
    fn type_is_subtype_of_succeeds() {
        assert!(Type::from(dog()).is_subtype_of(&animal().into()));
        assert!(!Type::from(animal()).is_subtype_of(&dog().into()));

        let dogs = list().parameterized([Type::from(dog())]);
        let animals = collection().parameterized([Type::extends(animal())]);
        assert!(dogs.is_subtype_of(&animals));

        let exact = collection().parameterized([Type::from(animal())]);
        assert!(!dogs.is_subtype_of(&exact));
    }

    #[test]
    fn resolve_runtime_type_succeeds() {
        let declared = list().parameterized([Type::from(dog())]);

        let resolved = resolve_runtime_type(&collection().into(), &declared);
        assert_eq!(resolved, Some(collection().parameterized([Type::from(dog())])));

        let concrete = Type::from(dog());
        assert_eq!(resolve_runtime_type(&concrete, &declared), Some(concrete));
    }

    #[test]
    fn resolve_runtime_type_succeeds_when_declared_type_is_a_supertype() {
        let declared = collection().parameterized([Type::from(dog())]);

        let resolved = resolve_runtime_type(&list().into(), &declared);
        assert_eq!(resolved, Some(list().parameterized([Type::from(dog())])));

        let map = Class::named("Map")
            .with_params(["K", "V"])
            .extends(collection().parameterized([Type::variable("V")]));
        assert_eq!(resolve_runtime_type(&map.into(), &declared), None);
    }

    #[test]
    fn resolve_runtime_type_fails_when_declared_type_is_unrelated() {
        let declared = Type::from(animal());
        assert_eq!(resolve_runtime_type(&list().into(), &declared), None);
    }
}

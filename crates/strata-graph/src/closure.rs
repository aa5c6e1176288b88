//! Ordered transitive closure.
//!
//! Depth-first, post-order: every module is emitted after all of its
//! dependencies, and roots are visited in the order given, so the output is
//! deterministic for identical inputs. Back edges (cycles) are reported and
//! dropped; unresolvable modules are reported and skipped.

use rustc_hash::FxHashMap;

use crate::module_id::ModuleId;

/// Supplies direct dependencies during a closure walk.
pub trait DependencySource {
    /// Normalized direct dependencies of `id`, or `None` when the module
    /// cannot be located.
    fn dependencies(&mut self, id: &ModuleId) -> Option<Vec<ModuleId>>;
}

/// Something noteworthy seen while walking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClosureEvent {
    /// `module` could not be located. `referrer` is `None` for a root.
    Missing {
        module: ModuleId,
        referrer: Option<ModuleId>,
    },
    /// The edge `from -> to` closes a cycle and was not followed.
    Cycle { from: ModuleId, to: ModuleId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// Modules in dependency order.
    pub order: Vec<ModuleId>,
    pub events: Vec<ClosureEvent>,
}

impl Closure {
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.order.contains(id)
    }

    pub fn cycles(&self) -> impl Iterator<Item = (&ModuleId, &ModuleId)> {
        self.events.iter().filter_map(|e| match e {
            ClosureEvent::Cycle { from, to } => Some((from, to)),
            _ => None,
        })
    }

    pub fn missing(&self) -> impl Iterator<Item = &ModuleId> {
        self.events.iter().filter_map(|e| match e {
            ClosureEvent::Missing { module, .. } => Some(module),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
    Missing,
}

/// Compute the ordered closure of `roots`.
///
/// Modules for which `stop` returns `true` are neither emitted nor walked
/// through.
pub fn ordered_closure<S, F>(source: &mut S, roots: &[ModuleId], stop: F) -> Closure
where
    S: DependencySource + ?Sized,
    F: Fn(&ModuleId) -> bool,
{
    let mut marks: FxHashMap<ModuleId, Mark> = FxHashMap::default();
    let mut closure = Closure::default();

    for root in roots {
        if stop(root) || marks.contains_key(root) {
            continue;
        }
        let Some(deps) = source.dependencies(root) else {
            marks.insert(root.clone(), Mark::Missing);
            closure.events.push(ClosureEvent::Missing {
                module: root.clone(),
                referrer: None,
            });
            continue;
        };

        marks.insert(root.clone(), Mark::OnStack);
        let mut stack: Vec<(ModuleId, std::vec::IntoIter<ModuleId>)> =
            vec![(root.clone(), deps.into_iter())];

        while let Some(top) = stack.len().checked_sub(1) {
            let Some(dep) = stack[top].1.next() else {
                if let Some((node, _)) = stack.pop() {
                    marks.insert(node.clone(), Mark::Done);
                    closure.order.push(node);
                }
                continue;
            };
            if stop(&dep) {
                continue;
            }
            match marks.get(&dep).copied() {
                Some(Mark::OnStack) => closure.events.push(ClosureEvent::Cycle {
                    from: stack[top].0.clone(),
                    to: dep,
                }),
                Some(Mark::Done | Mark::Missing) => {}
                None => match source.dependencies(&dep) {
                    Some(next) => {
                        marks.insert(dep.clone(), Mark::OnStack);
                        stack.push((dep, next.into_iter()));
                    }
                    None => {
                        marks.insert(dep.clone(), Mark::Missing);
                        closure.events.push(ClosureEvent::Missing {
                            module: dep,
                            referrer: Some(stack[top].0.clone()),
                        });
                    }
                },
            }
        }
    }

    closure
}

/// Plain adjacency-list source, handy for tests and precomputed graphs.
#[derive(Debug, Clone, Default)]
pub struct StaticDependencies {
    edges: FxHashMap<ModuleId, Vec<ModuleId>>,
}

impl StaticDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ModuleId, deps: Vec<ModuleId>) {
        self.edges.insert(id, deps);
    }
}

impl DependencySource for StaticDependencies {
    fn dependencies(&mut self, id: &ModuleId) -> Option<Vec<ModuleId>> {
        self.edges.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s).unwrap()
    }

    /// `("a/main", "a/x a/y")`: dependencies separated by spaces.
    fn source(edges: &[(&str, &str)]) -> StaticDependencies {
        let mut src = StaticDependencies::new();
        for (from, to) in edges {
            src.insert(id(from), to.split_whitespace().map(id).collect());
        }
        src
    }

    fn names(c: &Closure) -> Vec<&str> {
        c.order.iter().map(ModuleId::as_str).collect()
    }

    #[test]
    fn post_order_follows_declaration_order() {
        let mut src = source(&[
            ("a/main", "a/x a/y"),
            ("a/x", "a/z"),
            ("a/y", "a/z"),
            ("a/z", ""),
        ]);
        let c = ordered_closure(&mut src, &[id("a/main")], |_| false);
        assert_eq!(names(&c), vec!["a/z", "a/x", "a/y", "a/main"]);
        assert!(c.events.is_empty());
    }

    #[test]
    fn stop_set_prunes_subtrees() {
        let mut src = source(&[("a/w", "a/m a/q"), ("a/m", "a/k"), ("a/k", ""), ("a/q", "")]);
        let c = ordered_closure(&mut src, &[id("a/w")], |m| m.as_str() == "a/m");
        assert_eq!(names(&c), vec!["a/q", "a/w"]);
    }

    #[test]
    fn cycle_is_reported_once_and_broken() {
        let mut src = source(&[("a/a", "a/b"), ("a/b", "a/c"), ("a/c", "a/a")]);
        let c = ordered_closure(&mut src, &[id("a/a")], |_| false);
        assert_eq!(names(&c), vec!["a/c", "a/b", "a/a"]);
        let cycles: Vec<_> = c.cycles().collect();
        assert_eq!(cycles, vec![(&id("a/c"), &id("a/a"))]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut src = source(&[("a/a", "a/a")]);
        let c = ordered_closure(&mut src, &[id("a/a")], |_| false);
        assert_eq!(names(&c), vec!["a/a"]);
        assert_eq!(c.cycles().count(), 1);
    }

    #[test]
    fn missing_modules_are_skipped() {
        let mut src = source(&[("a/a", "a/gone a/b"), ("a/b", "a/gone")]);
        let c = ordered_closure(&mut src, &[id("a/a"), id("a/root-gone")], |_| false);
        assert_eq!(names(&c), vec!["a/b", "a/a"]);
        assert_eq!(
            c.events,
            vec![
                ClosureEvent::Missing {
                    module: id("a/gone"),
                    referrer: Some(id("a/a"))
                },
                ClosureEvent::Missing {
                    module: id("a/root-gone"),
                    referrer: None
                },
            ]
        );
    }
}

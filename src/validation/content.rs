//! Matching child element sequences against particles
//!
//! The matcher works on sets of positions: applying a term to a set of
//! positions in the child list yields every position the term can end at.
//! Each position remembers which declaration (or wildcard) every child up to
//! it was matched by, so the children can be validated afterwards. `all`
//! groups are matched by trying the unused members in every order.

use crate::documents::Element;
use crate::namespaces::QName;
use crate::schema::{ElementDecl, Particle, ProcessContents, SchemaModel, Term};
use indexmap::IndexMap;

const MAX_GROUP_NESTING: usize = 64;

/// What a child element was matched by
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    Element(ElementDecl),
    Wildcard(ProcessContents),
}

type States = IndexMap<usize, Vec<Binding>>;

pub(crate) struct ContentMatcher<'a, S: SchemaModel + ?Sized> {
    schema: &'a S,
    children: Vec<&'a Element>,
    furthest: usize,
    groups: usize,
}

impl<'a, S: SchemaModel + ?Sized> ContentMatcher<'a, S> {
    pub(crate) fn new(schema: &'a S, children: Vec<&'a Element>) -> Self {
        Self {
            schema,
            children,
            furthest: 0,
            groups: 0,
        }
    }

    /// Bindings for every child, or a message describing the mismatch
    pub(crate) fn run(mut self, particle: &Particle) -> Result<Vec<Binding>, String> {
        let mut start = States::new();
        start.insert(0, Vec::new());
        let end = self.particle(particle, start)?;
        let n = self.children.len();
        if let Some(bindings) = end.get(&n) {
            return Ok(bindings.clone());
        }
        Err(match self.children.get(self.furthest) {
            Some(child) => format!("unexpected element '{}'", child.name),
            None => "content is incomplete".to_string(),
        })
    }

    fn particle(&mut self, particle: &Particle, from: States) -> Result<States, String> {
        let occurs = particle.occurs;
        let mut results = States::new();
        if occurs.min == 0 {
            merge(&mut results, &from);
        }
        let mut current = from;
        let mut count = 0u32;
        let limit = occurs
            .max
            .unwrap_or_else(|| occurs.min.saturating_add(self.children.len() as u32 + 1));
        while count < limit && !current.is_empty() {
            count += 1;
            let mut next = self.term(&particle.term, &current)?;
            if count > occurs.min {
                // Past the minimum only progress matters
                next.retain(|pos, _| !results.contains_key(pos));
            }
            if count >= occurs.min {
                merge(&mut results, &next);
            }
            current = next;
        }
        Ok(results)
    }

    fn term(&mut self, term: &Term, from: &States) -> Result<States, String> {
        let mut out = States::new();
        match term {
            Term::Element(decl) => {
                for (&pos, bindings) in from {
                    if self.child_named(pos, &decl.name) {
                        self.advance(&mut out, pos, bindings, Binding::Element(decl.clone()));
                    }
                }
            }
            Term::ElementRef(name) => {
                let head = self
                    .schema
                    .global_element(name)
                    .ok_or_else(|| format!("reference to undeclared element '{}'", name))?;
                let mut candidates = vec![head];
                candidates.extend(self.schema.substitution_members(name));
                for (&pos, bindings) in from {
                    let matched = candidates.iter().find(|d| self.child_named(pos, &d.name));
                    if let Some(decl) = matched {
                        let binding = Binding::Element((*decl).clone());
                        self.advance(&mut out, pos, bindings, binding);
                    }
                }
            }
            Term::Any(wildcard) => {
                for (&pos, bindings) in from {
                    let allowed = self
                        .children
                        .get(pos)
                        .is_some_and(|c| wildcard.namespaces.allows(c.name.namespace()));
                    if allowed {
                        let binding = Binding::Wildcard(wildcard.process_contents);
                        self.advance(&mut out, pos, bindings, binding);
                    }
                }
            }
            Term::Sequence(particles) => {
                let mut current = from.clone();
                for p in particles {
                    current = self.particle(p, current)?;
                    if current.is_empty() {
                        break;
                    }
                }
                out = current;
            }
            Term::Choice { branches, .. } => {
                for branch in branches {
                    let reached = self.particle(branch, from.clone())?;
                    merge(&mut out, &reached);
                }
            }
            Term::All(particles) => {
                let mut used = vec![false; particles.len()];
                for (&pos, bindings) in from {
                    self.all(particles, &mut used, pos, bindings.clone(), &mut out)?;
                }
            }
            Term::GroupRef(name) => {
                let group = self
                    .schema
                    .model_group(name)
                    .ok_or_else(|| format!("reference to undeclared model group '{}'", name))?;
                self.groups += 1;
                if self.groups > MAX_GROUP_NESTING {
                    return Err(format!("model group '{}' nests too deeply", name));
                }
                let reached = self.particle(group, from.clone());
                self.groups -= 1;
                out = reached?;
            }
        }
        Ok(out)
    }

    fn all(
        &mut self,
        particles: &[Particle],
        used: &mut [bool],
        pos: usize,
        bindings: Vec<Binding>,
        out: &mut States,
    ) -> Result<(), String> {
        let complete = particles
            .iter()
            .zip(used.iter())
            .all(|(p, used)| *used || emptiable(p));
        if complete {
            out.entry(pos).or_insert_with(|| bindings.clone());
        }
        for i in 0..particles.len() {
            if used[i] {
                continue;
            }
            let mut start = States::new();
            start.insert(pos, bindings.clone());
            let reached = self.particle(&particles[i], start)?;
            used[i] = true;
            for (next, next_bindings) in reached {
                if next > pos {
                    self.all(particles, used, next, next_bindings, out)?;
                }
            }
            used[i] = false;
        }
        Ok(())
    }

    fn child_named(&self, pos: usize, name: &QName) -> bool {
        self.children.get(pos).is_some_and(|c| &c.name == name)
    }

    fn advance(&mut self, out: &mut States, pos: usize, bindings: &[Binding], binding: Binding) {
        let next = pos + 1;
        self.furthest = self.furthest.max(next);
        out.entry(next).or_insert_with(|| {
            let mut extended = bindings.to_vec();
            extended.push(binding);
            extended
        });
    }
}

fn merge(into: &mut States, from: &States) {
    for (&pos, bindings) in from {
        into.entry(pos).or_insert_with(|| bindings.clone());
    }
}

/// Whether a particle can match no elements at all
fn emptiable(particle: &Particle) -> bool {
    particle.occurs.min == 0
        || match &particle.term {
            Term::Sequence(ps) | Term::All(ps) => ps.iter().all(emptiable),
            Term::Choice { branches, .. } => branches.iter().any(emptiable),
            _ => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Occurs, Schema, TypeRef};

    fn decl(name: &str) -> ElementDecl {
        ElementDecl::new(QName::local(name), TypeRef::builtin("string"))
    }

    fn children(names: &[&str]) -> Vec<Element> {
        names.iter().map(|n| Element::new(QName::local(*n))).collect()
    }

    fn check(particle: &Particle, names: &[&str]) -> Result<Vec<Binding>, String> {
        let schema = Schema::new(None);
        let elements = children(names);
        ContentMatcher::new(&schema, elements.iter().collect()).run(particle)
    }

    #[test]
    fn test_sequence_with_occurs() {
        let p = Particle::sequence(vec![
            Particle::element(decl("a")).with_occurs(Occurs::new(1, Some(2)).unwrap()),
            Particle::element(decl("b")).with_occurs(Occurs::optional()),
        ]);
        assert_eq!(check(&p, &["a"]).unwrap().len(), 1);
        assert!(check(&p, &["a", "a", "b"]).is_ok());
        assert!(check(&p, &[]).is_err());
        let err = check(&p, &["a", "a", "a"]).unwrap_err();
        assert!(err.contains("unexpected element 'a'"));
        assert!(check(&p, &["b", "a"]).is_err());
    }

    #[test]
    fn test_choice_repeated() {
        let p = Particle::choice(vec![Particle::element(decl("x")), Particle::element(decl("y"))])
            .with_occurs(Occurs::zero_or_more());
        assert!(check(&p, &[]).is_ok());
        assert!(check(&p, &["x", "y", "y", "x"]).is_ok());
        assert!(check(&p, &["x", "z"]).is_err());
    }

    #[test]
    fn test_all_in_any_order() {
        let p = Particle::all(vec![
            Particle::element(decl("a")),
            Particle::element(decl("b")),
            Particle::element(decl("c")).with_occurs(Occurs::optional()),
        ]);
        assert!(check(&p, &["b", "a"]).is_ok());
        assert!(check(&p, &["c", "a", "b"]).is_ok());
        assert!(check(&p, &["a"]).is_err());
        assert!(check(&p, &["a", "b", "a"]).is_err());
    }

    #[test]
    fn test_emptiable_member_inside_unbounded() {
        let a = Particle::element(decl("a")).with_occurs(Occurs::optional());
        let p = Particle::sequence(vec![a]).with_occurs(Occurs::zero_or_more());
        assert!(check(&p, &["a", "a", "a"]).is_ok());
    }
}

//! Element trees following a schema
//!
//! [`ElementGenerator::new`] walks everything reachable from a root element
//! once and compiles it into an arena of element and type plans. Named types
//! and global elements get their arena slot before their content is derived,
//! so recursive references simply point back at an existing slot.
//!
//! After derivation a fixpoint computes, for every plan, the minimum number
//! of element levels needed to complete it. Generation uses those heights to
//! stay terminating: choices and substitutes that can never complete are
//! skipped, and past the depth limit for the current size (or once the node
//! budget is spent) only minimal content is produced, always taking a branch
//! of least height. A root with no finite height is rejected up front with
//! `UnboundedRecursion`.

use crate::builtins::BuiltinType;
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::limits::{ChoiceWeighting, GeneratorConfig};
use crate::namespaces::QName;
use crate::schema::{
    AttributeUse, ComplexType, ContentModel, ElementDecl, FacetSet, NamespaceConstraint, Occurs,
    Particle, ProcessContents, SchemaModel, Term, TypeDefinition, TypeRef, Wildcard,
};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::facets::ScalarGenerator;
use super::registry::CustomGenerators;
use super::sampling::{self, Batch, Tier};
use super::{Gen, GenContext, RandomSource};

const INF: u32 = u32::MAX;
const OTHER_NAMESPACE: &str = "urn:xmlschema-arbitrary:other";

type TypeId = usize;
type ElemId = usize;

#[derive(Debug)]
enum TypePlan {
    Pending,
    Any,
    Simple(ScalarGenerator),
    Complex(ComplexPlan),
}

#[derive(Debug)]
struct ComplexPlan {
    mixed: bool,
    attributes: Vec<AttributePlan>,
    content: ContentPlan,
}

#[derive(Debug)]
enum ContentPlan {
    Empty,
    Simple(ScalarGenerator),
    Elements(ParticlePlan),
}

#[derive(Debug)]
struct AttributePlan {
    name: QName,
    required: bool,
    fixed: Option<String>,
    value: ScalarGenerator,
}

#[derive(Debug)]
struct ParticlePlan {
    term: TermPlan,
    occurs: Occurs,
    /// Height of one occurrence of the term
    height: u32,
}

impl ParticlePlan {
    fn min_height(&self) -> u32 {
        if self.occurs.min == 0 {
            0
        } else {
            self.height
        }
    }
}

#[derive(Debug)]
enum TermPlan {
    Element(ElemId),
    Sequence(Vec<ParticlePlan>),
    Choice {
        branches: Vec<ParticlePlan>,
        weights: Option<Vec<u32>>,
    },
    All(Vec<ParticlePlan>),
    Wildcard(WildcardPlan),
}

#[derive(Debug)]
enum WildcardPlan {
    /// Lax or skip: any element name in an admitted namespace
    Open(NamespaceConstraint),
    /// Strict: one of the matching global elements
    Strict(Vec<ElemId>),
}

#[derive(Debug)]
struct ElementPlan {
    name: QName,
    variants: Vec<Variant>,
}

/// One concrete way to instantiate an element particle
#[derive(Debug)]
struct Variant {
    name: QName,
    body: VariantBody,
    xsi_type: Option<QName>,
    fixed: Option<String>,
}

#[derive(Debug)]
enum VariantBody {
    Custom(Gen<Element>),
    Typed(TypeId),
}

#[derive(Debug)]
struct Plan {
    types: Vec<TypePlan>,
    elements: Vec<ElementPlan>,
    type_heights: Vec<u32>,
    element_heights: Vec<u32>,
    global_names: HashSet<QName>,
    default_namespace: Option<String>,
}

impl Plan {
    fn variant_height(&self, variant: &Variant) -> u32 {
        match variant.body {
            VariantBody::Custom(_) => 1,
            VariantBody::Typed(t) => self.type_heights[t].saturating_add(1),
        }
    }
}

// =============================================================================
// Derivation
// =============================================================================

struct PlanBuilder<'s, S: SchemaModel + ?Sized> {
    schema: &'s S,
    customs: &'s CustomGenerators,
    config: Arc<GeneratorConfig>,
    types: Vec<TypePlan>,
    elements: Vec<ElementPlan>,
    named_types: HashMap<QName, TypeId>,
    global_elements: HashMap<QName, ElemId>,
    group_stack: Vec<QName>,
}

impl<'s, S: SchemaModel + ?Sized> PlanBuilder<'s, S> {
    fn new(schema: &'s S, customs: &'s CustomGenerators, config: Arc<GeneratorConfig>) -> Self {
        Self {
            schema,
            customs,
            config,
            types: Vec::new(),
            elements: Vec::new(),
            named_types: HashMap::new(),
            global_elements: HashMap::new(),
            group_stack: Vec::new(),
        }
    }

    fn global_element(&mut self, name: &QName) -> Result<ElemId> {
        if let Some(&id) = self.global_elements.get(name) {
            tracing::trace!(element = %name, "element plan cache hit");
            return Ok(id);
        }
        let schema = self.schema;
        let decl = schema
            .global_element(name)
            .ok_or_else(|| Error::UnknownElement(name.to_string()))?;
        let id = self.elements.len();
        self.elements.push(ElementPlan {
            name: name.clone(),
            variants: Vec::new(),
        });
        self.global_elements.insert(name.clone(), id);

        let variants = match self.customs.lookup(name) {
            Some(gen) => vec![Variant {
                name: name.clone(),
                body: VariantBody::Custom(gen.clone()),
                xsi_type: None,
                fixed: None,
            }],
            None => {
                let mut candidates: Vec<&'s ElementDecl> = Vec::new();
                if !decl.is_abstract {
                    candidates.push(decl);
                }
                let members = schema.substitution_members(name);
                candidates.extend(members.into_iter().filter(|d| !d.is_abstract));
                let mut variants = Vec::new();
                for candidate in candidates {
                    variants.extend(self.variants_of(candidate)?);
                }
                variants
            }
        };
        if variants.is_empty() {
            return Err(Error::NoConcreteSubstitute {
                component: format!("element {}", name),
            });
        }
        tracing::debug!(element = %name, variants = variants.len(), "derived element plan");
        self.elements[id].variants = variants;
        Ok(id)
    }

    fn local_element(&mut self, decl: &ElementDecl) -> Result<ElemId> {
        let variants = if decl.is_abstract {
            Vec::new()
        } else {
            self.variants_of(decl)?
        };
        if variants.is_empty() {
            return Err(Error::NoConcreteSubstitute {
                component: format!("element {}", decl.name),
            });
        }
        self.elements.push(ElementPlan {
            name: decl.name.clone(),
            variants,
        });
        Ok(self.elements.len() - 1)
    }

    /// Concrete instantiations of one non-abstract declaration
    fn variants_of(&mut self, decl: &ElementDecl) -> Result<Vec<Variant>> {
        if let Some(gen) = self.customs.lookup(&decl.name) {
            return Ok(vec![Variant {
                name: decl.name.clone(),
                body: VariantBody::Custom(gen.clone()),
                xsi_type: None,
                fixed: None,
            }]);
        }
        let schema = self.schema;
        let type_ref = schema.element_type(decl);
        let abstract_type = match &type_ref {
            TypeRef::Named(name) if !name.is_xsd() => {
                schema.type_definition(name).is_some_and(|d| d.is_abstract())
            }
            TypeRef::Named(_) => false,
            TypeRef::Anonymous(def) => def.is_abstract(),
        };
        if !abstract_type {
            let ty = self.type_id(&type_ref)?;
            return Ok(vec![Variant {
                name: decl.name.clone(),
                body: VariantBody::Typed(ty),
                xsi_type: None,
                fixed: decl.fixed.clone(),
            }]);
        }

        let mut variants = Vec::new();
        if let Some(base) = type_ref.name() {
            for derived in schema.derived_types(base) {
                if schema.type_definition(derived).is_some_and(|d| d.is_abstract()) {
                    continue;
                }
                let ty = self.type_id(&TypeRef::named(derived.clone()))?;
                variants.push(Variant {
                    name: decl.name.clone(),
                    body: VariantBody::Typed(ty),
                    xsi_type: Some(derived.clone()),
                    fixed: decl.fixed.clone(),
                });
            }
        }
        if variants.is_empty() {
            return Err(Error::NoConcreteSubstitute {
                component: format!("type {} of element {}", type_ref.label(), decl.name),
            });
        }
        Ok(variants)
    }

    fn type_id(&mut self, type_ref: &TypeRef) -> Result<TypeId> {
        let schema = self.schema;
        match type_ref {
            TypeRef::Named(name) => {
                if let Some(&id) = self.named_types.get(name) {
                    return Ok(id);
                }
                let id = self.types.len();
                self.types.push(TypePlan::Pending);
                self.named_types.insert(name.clone(), id);
                let plan = if name.is_xsd() && name.local_name == "anyType" {
                    TypePlan::Any
                } else if name.is_xsd() {
                    TypePlan::Simple(self.scalar(type_ref)?)
                } else {
                    match schema.type_definition(name) {
                        Some(TypeDefinition::Simple(_)) => TypePlan::Simple(self.scalar(type_ref)?),
                        Some(TypeDefinition::Complex(ct)) => TypePlan::Complex(self.complex(ct)?),
                        None => return Err(Error::UnknownType(name.to_string())),
                    }
                };
                tracing::debug!(type_name = %name, "derived type plan");
                self.types[id] = plan;
                Ok(id)
            }
            TypeRef::Anonymous(def) => {
                let plan = match def.as_ref() {
                    TypeDefinition::Simple(_) => TypePlan::Simple(self.scalar(type_ref)?),
                    TypeDefinition::Complex(ct) => TypePlan::Complex(self.complex(ct)?),
                };
                self.types.push(plan);
                Ok(self.types.len() - 1)
            }
        }
    }

    fn scalar(&self, type_ref: &TypeRef) -> Result<ScalarGenerator> {
        ScalarGenerator::for_type(self.schema, type_ref, Arc::clone(&self.config))
    }

    fn complex(&mut self, ct: &ComplexType) -> Result<ComplexPlan> {
        let mut attributes = Vec::new();
        for attr in &ct.attributes {
            if attr.use_ == AttributeUse::Prohibited {
                continue;
            }
            attributes.push(AttributePlan {
                name: attr.name.clone(),
                required: attr.is_required(),
                fixed: attr.fixed.clone(),
                value: self.scalar(&attr.type_ref)?,
            });
        }
        let content = match &ct.content {
            ContentModel::Empty => ContentPlan::Empty,
            ContentModel::Simple(type_ref) => ContentPlan::Simple(self.scalar(type_ref)?),
            ContentModel::Elements(particle) => ContentPlan::Elements(self.particle(particle)?),
        };
        Ok(ComplexPlan {
            mixed: ct.mixed,
            attributes,
            content,
        })
    }

    fn particles(&mut self, particles: &[Particle]) -> Result<Vec<ParticlePlan>> {
        particles.iter().map(|p| self.particle(p)).collect()
    }

    fn particle(&mut self, particle: &Particle) -> Result<ParticlePlan> {
        let term = match &particle.term {
            Term::Element(decl) => TermPlan::Element(self.local_element(decl)?),
            Term::ElementRef(name) => TermPlan::Element(self.global_element(name)?),
            Term::Sequence(children) => TermPlan::Sequence(self.particles(children)?),
            Term::Choice { branches, weights } => TermPlan::Choice {
                branches: self.particles(branches)?,
                weights: weights.clone(),
            },
            Term::All(children) => TermPlan::All(self.particles(children)?),
            Term::GroupRef(name) => {
                if self.group_stack.contains(name) {
                    return Err(Error::Schema(format!("model group {} refers to itself", name)));
                }
                let schema = self.schema;
                let group = schema
                    .model_group(name)
                    .ok_or_else(|| Error::Schema(format!("unknown model group {}", name)))?;
                self.group_stack.push(name.clone());
                let inner = self.particle(group);
                self.group_stack.pop();
                TermPlan::Sequence(vec![inner?])
            }
            Term::Any(wildcard) => TermPlan::Wildcard(self.wildcard(wildcard)?),
        };
        Ok(ParticlePlan {
            term,
            occurs: particle.occurs,
            height: INF,
        })
    }

    fn wildcard(&mut self, wildcard: &Wildcard) -> Result<WildcardPlan> {
        if let NamespaceConstraint::Enumerated(list) = &wildcard.namespaces {
            if list.is_empty() {
                return Err(Error::SchemaUnsupportedConstruct(
                    "wildcard admitting no namespace".to_string(),
                ));
            }
        }
        match wildcard.process_contents {
            ProcessContents::Lax | ProcessContents::Skip => {
                Ok(WildcardPlan::Open(wildcard.namespaces.clone()))
            }
            ProcessContents::Strict => {
                let schema = self.schema;
                let names: Vec<&'s QName> = schema
                    .global_elements()
                    .into_iter()
                    .filter(|d| !d.is_abstract && wildcard.namespaces.allows(d.name.namespace()))
                    .map(|d| &d.name)
                    .collect();
                if names.is_empty() {
                    return Err(Error::SchemaUnsupportedConstruct(
                        "strict wildcard matching no global element".to_string(),
                    ));
                }
                let ids = names
                    .into_iter()
                    .map(|n| self.global_element(n))
                    .collect::<Result<Vec<_>>>()?;
                Ok(WildcardPlan::Strict(ids))
            }
        }
    }

    fn finish(self, default_namespace: Option<String>) -> Plan {
        let mut plan = Plan {
            type_heights: vec![INF; self.types.len()],
            element_heights: vec![INF; self.elements.len()],
            types: self.types,
            elements: self.elements,
            global_names: self.schema.global_elements().iter().map(|d| d.name.clone()).collect(),
            default_namespace,
        };
        compute_heights(&mut plan);
        plan
    }
}

// =============================================================================
// Heights
// =============================================================================

fn compute_heights(plan: &mut Plan) {
    loop {
        let mut changed = false;
        for t in 0..plan.types.len() {
            let h = match &plan.types[t] {
                TypePlan::Pending => INF,
                TypePlan::Any | TypePlan::Simple(_) => 0,
                TypePlan::Complex(c) => match &c.content {
                    ContentPlan::Elements(p) => particle_height(p, &plan.element_heights),
                    _ => 0,
                },
            };
            if h < plan.type_heights[t] {
                plan.type_heights[t] = h;
                changed = true;
            }
        }
        for e in 0..plan.elements.len() {
            let h = plan.elements[e]
                .variants
                .iter()
                .map(|v| plan.variant_height(v))
                .min()
                .unwrap_or(INF);
            if h < plan.element_heights[e] {
                plan.element_heights[e] = h;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let element_heights = plan.element_heights.clone();
    for ty in plan.types.iter_mut() {
        if let TypePlan::Complex(ComplexPlan {
            content: ContentPlan::Elements(p),
            ..
        }) = ty
        {
            annotate(p, &element_heights);
        }
    }
}

fn particle_height(p: &ParticlePlan, element_heights: &[u32]) -> u32 {
    if p.occurs.min == 0 {
        0
    } else {
        term_height(&p.term, element_heights)
    }
}

fn term_height(term: &TermPlan, element_heights: &[u32]) -> u32 {
    match term {
        TermPlan::Element(e) => element_heights[*e],
        TermPlan::Sequence(children) | TermPlan::All(children) => children
            .iter()
            .map(|c| particle_height(c, element_heights))
            .max()
            .unwrap_or(0),
        TermPlan::Choice { branches, .. } => branches
            .iter()
            .map(|b| particle_height(b, element_heights))
            .min()
            .unwrap_or(INF),
        TermPlan::Wildcard(WildcardPlan::Open(_)) => 1,
        TermPlan::Wildcard(WildcardPlan::Strict(ids)) => {
            ids.iter().map(|e| element_heights[*e]).min().unwrap_or(INF)
        }
    }
}

/// Store term heights on every particle for use during generation
fn annotate(p: &mut ParticlePlan, element_heights: &[u32]) {
    p.height = term_height(&p.term, element_heights);
    match &mut p.term {
        TermPlan::Sequence(children) | TermPlan::All(children) => {
            children.iter_mut().for_each(|c| annotate(c, element_heights))
        }
        TermPlan::Choice { branches, .. } => {
            branches.iter_mut().for_each(|b| annotate(b, element_heights))
        }
        TermPlan::Element(_) | TermPlan::Wildcard(_) => {}
    }
}

// =============================================================================
// Generation
// =============================================================================

struct Walk<'p, 'a, 'c> {
    plan: &'p Plan,
    config: &'p GeneratorConfig,
    ctx: &'a mut GenContext<'c>,
}

impl<'p> Walk<'p, '_, '_> {
    fn minimal(&self) -> bool {
        self.ctx.depth >= self.config.depth_limit(self.ctx.size)
            || self.ctx.nodes >= self.config.node_budget
    }

    /// Size available at the current depth; halves with every level
    fn level_size(&self) -> u32 {
        self.ctx.size >> self.ctx.depth.saturating_sub(1).min(31)
    }

    fn enter(&mut self, name: &QName) -> Result<()> {
        let depth = self.ctx.depth + 1;
        if depth > self.config.max_depth {
            return Err(Error::UnboundedRecursion {
                component: name.to_string(),
                depth,
            });
        }
        self.ctx.depth = depth;
        self.ctx.nodes += 1;
        Ok(())
    }

    fn element(&mut self, id: ElemId) -> Result<Element> {
        let plan = self.plan;
        let element = &plan.elements[id];
        let heights: Vec<u32> = element.variants.iter().map(|v| plan.variant_height(v)).collect();
        let pool = self.pool(&heights);
        if pool.is_empty() {
            return Err(Error::UnboundedRecursion {
                component: element.name.to_string(),
                depth: self.ctx.depth,
            });
        }
        let variant = &element.variants[pool[self.ctx.rng.random_range(0..pool.len())]];

        self.enter(&variant.name)?;
        let result = self.instantiate(variant);
        self.ctx.depth -= 1;
        result
    }

    /// Indices worth drawing from: those that fit below `max_depth`, and
    /// only the lowest of them in minimal mode
    fn pool(&self, heights: &[u32]) -> Vec<usize> {
        let room = self.config.max_depth.saturating_sub(self.ctx.depth);
        let feasible: Vec<usize> = (0..heights.len())
            .filter(|&i| heights[i] != INF && heights[i] <= room)
            .collect();
        if self.minimal() {
            let best = feasible.iter().map(|&i| heights[i]).min();
            feasible.into_iter().filter(|&i| Some(heights[i]) == best).collect()
        } else {
            feasible
        }
    }

    fn instantiate(&mut self, variant: &'p Variant) -> Result<Element> {
        match &variant.body {
            VariantBody::Custom(gen) => {
                let element = gen.run(self.ctx)?;
                self.ctx.nodes += element.element_count().saturating_sub(1);
                Ok(element)
            }
            VariantBody::Typed(ty) => {
                let mut element = Element::new(variant.name.clone());
                element.xsi_type = variant.xsi_type.clone();
                self.fill(&mut element, *ty, variant.fixed.as_deref())?;
                Ok(element)
            }
        }
    }

    fn fill(&mut self, element: &mut Element, ty: TypeId, fixed: Option<&str>) -> Result<()> {
        let plan = self.plan;
        match &plan.types[ty] {
            TypePlan::Pending => Err(Error::Schema(format!(
                "type of {} was never derived",
                element.name
            ))),
            TypePlan::Any => Ok(()),
            TypePlan::Simple(scalar) => {
                let text = self.simple_text(scalar, fixed)?;
                element.push_text(text);
                Ok(())
            }
            TypePlan::Complex(complex) => {
                self.attributes(element, complex)?;
                match &complex.content {
                    ContentPlan::Empty => {
                        if complex.mixed {
                            self.mixed_text(element)?;
                        }
                    }
                    ContentPlan::Simple(scalar) => {
                        let text = self.simple_text(scalar, fixed)?;
                        element.push_text(text);
                    }
                    ContentPlan::Elements(particle) => {
                        let mut children = Vec::new();
                        self.particle(particle, &mut children)?;
                        for child in children {
                            if complex.mixed {
                                self.mixed_text(element)?;
                            }
                            element.push_child(child);
                        }
                        if complex.mixed {
                            self.mixed_text(element)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn simple_text(&mut self, scalar: &ScalarGenerator, fixed: Option<&str>) -> Result<String> {
        match fixed {
            Some(value) => Ok(value.to_string()),
            None => {
                let size = self.level_size();
                scalar.generate(&mut *self.ctx.rng, size)
            }
        }
    }

    fn mixed_text(&mut self, element: &mut Element) -> Result<()> {
        if self.ctx.rng.random_bool(0.5) {
            let size = self.config.leaf_size(self.level_size());
            let text = BuiltinType::String.synthesize(&mut *self.ctx.rng, size, &FacetSet::new())?;
            element.push_text(text);
        }
        Ok(())
    }

    fn attributes(&mut self, element: &mut Element, complex: &ComplexPlan) -> Result<()> {
        let probability = self.config.attribute_probability(self.level_size());
        for attr in &complex.attributes {
            if !attr.required && !self.ctx.rng.random_bool(probability) {
                continue;
            }
            let value = match &attr.fixed {
                Some(value) => value.clone(),
                None => {
                    let size = self.level_size();
                    attr.value.generate(&mut *self.ctx.rng, size)?
                }
            };
            element.attributes.insert(attr.name.clone(), value);
        }
        Ok(())
    }

    fn particle(&mut self, particle: &'p ParticlePlan, out: &mut Vec<Element>) -> Result<()> {
        let count = self.count(&particle.occurs, particle.height);
        for _ in 0..count {
            self.term(&particle.term, out)?;
        }
        Ok(())
    }

    fn count(&mut self, occurs: &Occurs, height: u32) -> u32 {
        if height == INF {
            return 0;
        }
        if self.ctx.depth.saturating_add(height) > self.config.max_depth {
            // Mandatory occurrences still fail in `enter`
            return occurs.min;
        }
        if self.minimal() {
            return occurs.min;
        }
        let hi = match occurs.max {
            Some(max) => max,
            None => occurs.min.saturating_add(self.config.repeat_cap(self.level_size())),
        };
        if hi <= occurs.min {
            occurs.min
        } else {
            self.ctx.rng.random_range(occurs.min..=hi)
        }
    }

    fn term(&mut self, term: &'p TermPlan, out: &mut Vec<Element>) -> Result<()> {
        match term {
            TermPlan::Element(id) => out.push(self.element(*id)?),
            TermPlan::Sequence(children) | TermPlan::All(children) => {
                for child in children {
                    self.particle(child, out)?;
                }
            }
            TermPlan::Choice { branches, weights } => {
                let i = self.branch(branches, weights.as_deref())?;
                self.particle(&branches[i], out)?;
            }
            TermPlan::Wildcard(WildcardPlan::Strict(ids)) => {
                let heights: Vec<u32> = ids.iter().map(|e| self.plan.element_heights[*e]).collect();
                let pool = self.pool(&heights);
                if pool.is_empty() {
                    return Err(Error::UnboundedRecursion {
                        component: "strict wildcard".to_string(),
                        depth: self.ctx.depth,
                    });
                }
                let id = ids[pool[self.ctx.rng.random_range(0..pool.len())]];
                out.push(self.element(id)?);
            }
            TermPlan::Wildcard(WildcardPlan::Open(namespaces)) => {
                out.push(self.open_wildcard(namespaces)?)
            }
        }
        Ok(())
    }

    fn branch(&mut self, branches: &[ParticlePlan], weights: Option<&[u32]>) -> Result<usize> {
        let heights: Vec<u32> = branches.iter().map(ParticlePlan::min_height).collect();
        let pool = self.pool(&heights);
        if pool.is_empty() {
            return Err(Error::UnboundedRecursion {
                component: "choice".to_string(),
                depth: self.ctx.depth,
            });
        }
        let hinted = self.config.choice_weighting == ChoiceWeighting::SchemaHint;
        if let Some(weights) = weights.filter(|_| hinted) {
            let weight = |i: usize| weights.get(i).copied().unwrap_or(0) as u64;
            let total: u64 = pool.iter().map(|&i| weight(i)).sum();
            if total > 0 {
                let mut draw = self.ctx.rng.random_range(0..total);
                for &i in &pool {
                    let w = weight(i);
                    if draw < w {
                        return Ok(i);
                    }
                    draw -= w;
                }
            }
        }
        Ok(pool[self.ctx.rng.random_range(0..pool.len())])
    }

    fn open_wildcard(&mut self, namespaces: &NamespaceConstraint) -> Result<Element> {
        let namespace = match namespaces {
            NamespaceConstraint::Any => self.plan.default_namespace.clone(),
            NamespaceConstraint::Other(excluded) => {
                if excluded.as_deref() == Some(OTHER_NAMESPACE) {
                    Some(format!("{}:alt", OTHER_NAMESPACE))
                } else {
                    Some(OTHER_NAMESPACE.to_string())
                }
            }
            NamespaceConstraint::Enumerated(list) => {
                list[self.ctx.rng.random_range(0..list.len())].clone()
            }
        };
        let len = 1 + self.ctx.rng.random_range(0..=self.level_size().min(8));
        let mut local: String = (0..len)
            .map(|i| {
                let alphabet: &[u8] = if i == 0 {
                    b"abcdefghijklmnopqrstuvwxyz"
                } else {
                    b"abcdefghijklmnopqrstuvwxyz0123456789"
                };
                alphabet[self.ctx.rng.random_range(0..alphabet.len())] as char
            })
            .collect();
        while self.plan.global_names.contains(&QName::new(namespace.as_deref(), local.as_str())) {
            local.push('x');
        }
        let name = QName::new(namespace, local);
        self.enter(&name)?;
        self.ctx.depth -= 1;
        Ok(Element::new(name))
    }
}

// =============================================================================
// Facade
// =============================================================================

/// Generator of instances of one global element
///
/// ```rust,ignore
/// let generator = ElementGenerator::new(&schema, &QName::local("purchaseOrder"),
///     CustomGenerators::new(), GeneratorConfig::default())?;
/// let batch = generator.sample(10, 5);
/// ```
#[derive(Debug, Clone)]
pub struct ElementGenerator {
    root: QName,
    root_id: ElemId,
    plan: Arc<Plan>,
    config: Arc<GeneratorConfig>,
}

impl ElementGenerator {
    /// Derive a generator for the global element `root`
    ///
    /// Fails if anything reachable from `root` cannot be derived, or if
    /// `root` can never be completed.
    pub fn new<S: SchemaModel + ?Sized>(
        schema: &S,
        root: &QName,
        customs: CustomGenerators,
        config: GeneratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let mut builder = PlanBuilder::new(schema, &customs, Arc::clone(&config));
        let root_id = builder.global_element(root)?;
        let plan = builder.finish(root.namespace.clone());
        let height = plan.element_heights[root_id];
        if height == INF {
            return Err(Error::UnboundedRecursion {
                component: root.to_string(),
                depth: 0,
            });
        }
        tracing::debug!(
            root = %root,
            types = plan.types.len(),
            elements = plan.elements.len(),
            min_height = height,
            "derived element generator"
        );
        Ok(Self {
            root: root.clone(),
            root_id,
            plan: Arc::new(plan),
            config,
        })
    }

    /// Root element name
    pub fn root(&self) -> &QName {
        &self.root
    }

    /// Configuration the generator was built with
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Fewest element levels any instance needs
    pub fn min_height(&self) -> u32 {
        self.plan.element_heights[self.root_id]
    }

    /// The underlying generator
    pub fn generator(&self) -> Gen<Element> {
        let plan = Arc::clone(&self.plan);
        let config = Arc::clone(&self.config);
        let root = self.root_id;
        Gen::from_fn(move |ctx| {
            Walk {
                plan: &plan,
                config: &config,
                ctx,
            }
            .element(root)
        })
    }

    /// `count` instances at the configured default size, freshly seeded
    pub fn generate(&self, count: usize) -> Batch<Element> {
        self.sample(self.config.default_size, count)
    }

    /// `count` instances at `size`, freshly seeded
    pub fn sample(&self, size: u32, count: usize) -> Batch<Element> {
        self.sample_with(size, count, RandomSource::fresh()).0
    }

    /// `count` instances at `size` from an explicit source
    pub fn sample_with(
        &self,
        size: u32,
        count: usize,
        source: RandomSource,
    ) -> (Batch<Element>, RandomSource) {
        sampling::sample(&self.generator(), size, count, source)
    }

    /// Instances across growth tiers from an explicit source
    pub fn sample_tiers(
        &self,
        tiers: &[Tier],
        source: RandomSource,
    ) -> (Batch<Element>, RandomSource) {
        sampling::sample_tiers(&self.generator(), tiers, source)
    }
}

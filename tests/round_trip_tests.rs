//! End-to-end tests: derive a generator for a whole schema, sample it and
//! check every instance with the reference validator after an XML round trip.

mod common;

use common::{formula, generator, logic, purchase_order};
use xmlschema_arbitrary::schema::{ComplexType, ElementDecl, Occurs, Particle, TypeRef};
use xmlschema_arbitrary::{
    check_schema, CustomGenerators, Element, ElementGenerator, ErrorKind, Gen, GeneratorConfig,
    Node, QName, RandomSource, RoundTripChecker, Schema, SchemaModel, SchemaValidator, Tier,
};

fn assert_round_trips(schema: &Schema, batch: &xmlschema_arbitrary::Batch<Element>) {
    let report = RoundTripChecker::new(SchemaValidator::new(schema)).check(batch);
    let details: Vec<String> = report
        .failures()
        .map(|f| format!("seed {} size {}: {:?}", f.seed, f.size, f.outcome.messages()))
        .collect();
    assert!(report.is_success(), "{}\n{}", report.summary(), details.join("\n"));
}

// =============================================================================
// Purchase order
// =============================================================================

#[test]
fn test_purchase_order_round_trip() {
    let schema = purchase_order();
    let gen = generator(&schema, &QName::local("purchaseOrder"));
    let (batch, _) = gen.sample_tiers(&Tier::default_growth(), RandomSource::from_seed(2024));
    assert_eq!(batch.len(), 10);
    assert!(batch.is_complete());
    assert_round_trips(&schema, &batch);
}

#[test]
fn test_purchase_order_structure() {
    let schema = purchase_order();
    let gen = generator(&schema, &QName::local("purchaseOrder"));
    let (batch, _) = gen.sample_with(20, 20, RandomSource::from_seed(7));
    for order in batch.values() {
        let names: Vec<&str> = order.child_elements().map(|c| c.local_name()).collect();
        assert_eq!(names.first(), Some(&"shipTo"));
        assert_eq!(names.last(), Some(&"items"));
        for address in order.find_children("shipTo") {
            if let Some(country) = address.get_attribute("country") {
                assert_eq!(country, "US");
            }
        }
        for item in order.find_children("items")[0].find_children("item") {
            let sku = item.get_attribute("partNum").expect("partNum is required");
            let bytes: Vec<char> = sku.chars().collect();
            assert_eq!(bytes.len(), 6, "{}", sku);
            assert_eq!(bytes[3], '-');
            let quantity: u32 = item.find_children("quantity")[0].text().parse().unwrap();
            assert!((1..100).contains(&quantity));
        }
    }
}

#[test]
fn test_items_grow_with_size() {
    let schema = purchase_order();
    let gen = generator(&schema, &QName::local("purchaseOrder"));
    let count_items = |size: u32| -> usize {
        let (batch, _) = gen.sample_with(size, 20, RandomSource::from_seed(size as u64));
        batch
            .values()
            .iter()
            .map(|order| order.find_children("items")[0].find_children("item").len())
            .sum()
    };
    assert_eq!(count_items(0), 0);
    assert!(count_items(50) > 0);
}

// =============================================================================
// Recursive schemas
// =============================================================================

#[test]
fn test_recursive_formula_round_trip() {
    let schema = formula();
    let gen = generator(&schema, &logic("Formula"));
    for size in [0, 10, 100, 1000] {
        let (batch, _) = gen.sample_with(size, 10, RandomSource::from_seed(31 + size as u64));
        assert_eq!(batch.len(), 10);
        assert!(batch.is_complete(), "size {}: {:?}", size, batch.failures().next());
        for element in batch.values() {
            assert_ne!(element.local_name(), "Formula");
            assert_eq!(element.name.namespace(), Some(common::LOGIC_NS));
        }
        assert_round_trips(&schema, &batch);
    }
}

#[test]
fn test_formula_minimal_instances() {
    let schema = formula();
    let gen = generator(&schema, &logic("Formula"));
    assert_eq!(gen.min_height(), 1);
    let (batch, _) = gen.sample_with(0, 30, RandomSource::from_seed(5));
    // At size zero the depth limit is reached immediately below the root
    for element in batch.values() {
        assert!(element.depth() <= 3, "{}", element);
    }
}

#[test]
fn test_every_formula_element_checks() {
    let schema = formula();
    let checks = check_schema(
        &schema,
        &CustomGenerators::new(),
        &GeneratorConfig::default(),
        &Tier::default_growth(),
        RandomSource::from_seed(404),
    );
    let names: Vec<&str> = checks.iter().map(|c| c.element.local_name.as_str()).collect();
    assert_eq!(names, vec!["Formula", "Var", "True", "And", "Or", "Not"]);
    for check in &checks {
        let report = check.result.as_ref().unwrap();
        assert!(report.is_success(), "{}: {}", check.element, report.summary());
    }
}

#[test]
fn test_recursion_without_base_case_is_rejected() {
    let schema = Schema::new(None).with_element(ElementDecl::new(
        QName::local("Chain"),
        TypeRef::complex(ComplexType::elements(Particle::sequence(vec![
            Particle::element_ref(QName::local("Chain")),
            Particle::element(ElementDecl::new(QName::local("link"), TypeRef::builtin("string")))
                .with_occurs(Occurs::optional()),
        ]))),
    ));
    let err = ElementGenerator::new(
        &schema,
        &QName::local("Chain"),
        CustomGenerators::new(),
        GeneratorConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnboundedRecursion);
}

// =============================================================================
// Substitution groups and abstract types
// =============================================================================

fn shapes() -> Schema {
    let ns = "urn:example:shapes";
    let q = |local: &str| QName::namespaced(ns, local);
    Schema::new(Some(ns))
        .with_complex_type(q("ShapeType"), ComplexType::empty().abstract_type())
        .with_complex_type(
            q("CircleType"),
            ComplexType::simple_content(TypeRef::builtin("decimal")).derived_from(q("ShapeType")),
        )
        .with_complex_type(
            q("SquareType"),
            ComplexType::simple_content(TypeRef::builtin("nonNegativeInteger"))
                .derived_from(q("ShapeType")),
        )
        .with_element(ElementDecl::new(q("shape"), TypeRef::named(q("ShapeType"))))
        .with_element(ElementDecl::untyped(q("figure")).abstract_element())
        .with_element(
            ElementDecl::new(q("label"), TypeRef::builtin("token")).substitutes(q("figure")),
        )
        .with_element(ElementDecl::untyped(q("caption")).substitutes(q("label")))
        .with_complex_type(
            q("Drawing"),
            ComplexType::elements(Particle::sequence(vec![
                Particle::element_ref(q("shape")).with_occurs(Occurs::one_or_more()),
                Particle::element_ref(q("figure")).with_occurs(Occurs::zero_or_more()),
            ])),
        )
        .with_element(ElementDecl::new(q("drawing"), TypeRef::named(q("Drawing"))))
}

#[test]
fn test_substitution_and_xsi_type() {
    let schema = shapes();
    let drawing = schema.qname("drawing");
    let gen = generator(&schema, &drawing);
    let (batch, _) = gen.sample_with(30, 20, RandomSource::from_seed(99));
    assert!(batch.is_complete());

    let mut xsi_types = std::collections::BTreeSet::new();
    let mut figures = std::collections::BTreeSet::new();
    for drawing in batch.values() {
        for child in drawing.child_elements() {
            match child.local_name() {
                "shape" => {
                    let ty = child.xsi_type.as_ref().expect("abstract type needs xsi:type");
                    xsi_types.insert(ty.local_name.clone());
                }
                other => {
                    assert_ne!(other, "figure");
                    figures.insert(other.to_string());
                }
            }
        }
    }
    assert_eq!(xsi_types.into_iter().collect::<Vec<_>>(), vec!["CircleType", "SquareType"]);
    assert_eq!(figures.into_iter().collect::<Vec<_>>(), vec!["caption", "label"]);
    assert_round_trips(&schema, &batch);

    // Untyped members inherit the head's type
    let caption = schema.global_element(&schema.qname("caption")).unwrap();
    assert_eq!(schema.element_type(caption), TypeRef::builtin("token"));
}

// =============================================================================
// All groups and mixed content
// =============================================================================

#[test]
fn test_all_group_with_optional_members() {
    let member = |name: &str, occurs: Occurs| {
        Particle::element(ElementDecl::new(QName::local(name), TypeRef::builtin("token")))
            .with_occurs(occurs)
    };
    let schema = Schema::new(None).with_element(ElementDecl::new(
        QName::local("card"),
        TypeRef::complex(ComplexType::elements(Particle::all(vec![
            member("name", Occurs::once()),
            member("email", Occurs::optional()),
            member("phone", Occurs::optional()),
        ]))),
    ));
    let gen = generator(&schema, &QName::local("card"));
    let (batch, _) = gen.sample_with(20, 50, RandomSource::from_seed(61));
    assert!(batch.is_complete());

    let mut shapes = std::collections::BTreeSet::new();
    for card in batch.values() {
        let names: Vec<&str> = card.child_elements().map(|c| c.local_name()).collect();
        assert_eq!(names.iter().filter(|n| **n == "name").count(), 1, "{:?}", names);
        assert!(names.iter().filter(|n| **n == "email").count() <= 1);
        assert!(names.iter().filter(|n| **n == "phone").count() <= 1);
        shapes.insert(names.join(","));
    }
    // Optional members come and go
    assert!(shapes.len() > 1, "{:?}", shapes);
    assert_round_trips(&schema, &batch);
}

#[test]
fn test_mixed_content_round_trip() {
    let emphasis = ElementDecl::new(QName::local("em"), TypeRef::builtin("token"));
    let schema = Schema::new(None).with_element(ElementDecl::new(
        QName::local("para"),
        TypeRef::complex(
            ComplexType::elements(
                Particle::element(emphasis).with_occurs(Occurs::zero_or_more()),
            )
            .mixed(),
        ),
    ));
    let gen = generator(&schema, &QName::local("para"));
    let (batch, _) = gen.sample_with(30, 50, RandomSource::from_seed(62));
    assert!(batch.is_complete());

    let with_text = batch
        .values()
        .iter()
        .filter(|para| para.children.iter().any(|n| matches!(n, Node::Text(t) if !t.is_empty())))
        .count();
    assert!(with_text > 0);
    for para in batch.values() {
        assert!(para.child_elements().all(|c| c.local_name() == "em"));
    }
    assert_round_trips(&schema, &batch);
}

// =============================================================================
// Overrides
// =============================================================================

#[test]
fn test_override_replaces_derived_generator() {
    let schema = purchase_order();
    let fixed_comment: Gen<Element> =
        Gen::from_fn(|_| Ok(Element::new(QName::local("comment")).with_text("hand written")));
    let customs = CustomGenerators::new().for_element(QName::local("comment"), fixed_comment);
    let root = QName::local("purchaseOrder");
    let gen = ElementGenerator::new(&schema, &root, customs, GeneratorConfig::default()).unwrap();
    let (batch, _) = gen.sample_with(40, 30, RandomSource::from_seed(12));

    let mut seen = 0;
    for order in batch.values() {
        order.walk(&mut |e| {
            if e.local_name() == "comment" {
                assert_eq!(e.text(), "hand written");
                seen += 1;
            }
        });
    }
    assert!(seen > 0);
    assert_round_trips(&schema, &batch);
}

#[test]
fn test_invalid_override_is_reported_not_hidden() {
    let schema = purchase_order();
    let broken: Gen<Element> = Gen::from_fn(|_| {
        Ok(Element::new(QName::local("comment")).with_child(Element::new(QName::local("b"))))
    });
    let customs = CustomGenerators::new().for_element(QName::local("comment"), broken);
    let root = QName::local("purchaseOrder");
    let gen = ElementGenerator::new(&schema, &root, customs, GeneratorConfig::default()).unwrap();
    let (batch, _) = gen.sample_with(40, 30, RandomSource::from_seed(12));
    let report = RoundTripChecker::new(SchemaValidator::new(&schema)).check(&batch);
    assert!(report.failed() > 0);
    let message = report.failures().next().unwrap().outcome.messages().join("\n");
    assert!(message.contains("comment"), "{}", message);
}

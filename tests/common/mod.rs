//! Shared schemas for the integration tests

#![allow(dead_code)]

use xmlschema_arbitrary::schema::{
    AttributeDecl, ComplexType, ElementDecl, FacetSet, Occurs, Particle, SimpleType, TypeRef,
};
use xmlschema_arbitrary::{CustomGenerators, ElementGenerator, GeneratorConfig, QName, Schema};

pub const LOGIC_NS: &str = "urn:example:logic";

/// The purchase order schema of the XML Schema primer
pub fn purchase_order() -> Schema {
    Schema::from_json_str(include_str!("../fixtures/purchase_order.json"))
        .expect("fixture schema loads")
}

pub fn logic(local: &str) -> QName {
    QName::namespaced(LOGIC_NS, local)
}

/// Propositional formulas; `And`, `Or` and `Not` recurse through the
/// abstract `Formula` head.
///
/// ```text
/// Formula := Var | True | And(Formula, Formula+) | Or(Formula, Formula+) | Not(Formula)
/// ```
pub fn formula() -> Schema {
    let formula = logic("Formula");
    let operands = ComplexType::elements(Particle::sequence(vec![
        Particle::element_ref(formula.clone()),
        Particle::element_ref(formula.clone()).with_occurs(Occurs::one_or_more()),
    ]));
    let var_name = SimpleType::restriction(
        TypeRef::builtin("string"),
        FacetSet::new().pattern("[a-z][0-9]?"),
    );

    Schema::new(Some(LOGIC_NS))
        .with_complex_type(logic("Operands"), operands)
        .with_simple_type(logic("VarName"), var_name)
        .with_element(ElementDecl::untyped(formula.clone()).abstract_element())
        .with_element(
            ElementDecl::new(
                logic("Var"),
                TypeRef::complex(ComplexType::empty().with_attribute(
                    AttributeDecl::new(QName::local("name"), TypeRef::named(logic("VarName")))
                        .required(),
                )),
            )
            .substitutes(formula.clone()),
        )
        .with_element(
            ElementDecl::new(logic("True"), TypeRef::complex(ComplexType::empty()))
                .substitutes(formula.clone()),
        )
        .with_element(
            ElementDecl::new(logic("And"), TypeRef::named(logic("Operands")))
                .substitutes(formula.clone()),
        )
        .with_element(
            ElementDecl::new(logic("Or"), TypeRef::named(logic("Operands")))
                .substitutes(formula.clone()),
        )
        .with_element(
            ElementDecl::new(
                logic("Not"),
                TypeRef::complex(ComplexType::elements(Particle::element_ref(formula.clone()))),
            )
            .substitutes(formula),
        )
}

pub fn generator(schema: &Schema, root: &QName) -> ElementGenerator {
    ElementGenerator::new(schema, root, CustomGenerators::new(), GeneratorConfig::default())
        .expect("generator derives")
}

//! Single-pass scan of one method body.

use crate::{
    analysis::{
        allocation::{classify, AllocationRecord},
        dispatch::{CallKind, DispatchResolver},
    },
    config::ScanConfig,
    metadata::{
        method::{MethodDefinition, Operand},
        provider::MetadataProvider,
        token::Token,
    },
};

/// What a scan found in one method body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Allocation sites in instruction order
    pub allocations: Vec<AllocationRecord>,
    /// Reachable callees, duplicate-free, in order of first appearance
    pub callees: Vec<Token>,
    /// Call candidates dropped by the dispatch filter
    pub pruned: usize,
}

/// Walks method bodies, classifying allocations and resolving calls.
///
/// `newobj` only counts as an allocation; the constructor it invokes is not
/// followed.
pub struct MethodScanner<'a, P: ?Sized> {
    provider: &'a P,
    resolver: DispatchResolver<'a, P>,
}

impl<'a, P> MethodScanner<'a, P>
where
    P: MetadataProvider + ?Sized,
{
    /// Creates a scanner over `provider`.
    pub fn new(provider: &'a P, config: &'a ScanConfig) -> Self {
        MethodScanner {
            provider,
            resolver: DispatchResolver::new(provider, config),
        }
    }

    /// Scans the body of `method`. A method without a body yields an empty outcome.
    pub fn scan(&self, method: &MethodDefinition) -> ScanOutcome {
        let body = method.instructions();
        let mut outcome = ScanOutcome::default();

        for (index, instruction) in body.iter().enumerate() {
            if let Some(kind) = CallKind::from_opcode(instruction.opcode) {
                let callee = match &instruction.operand {
                    Operand::Method(reference) => Some(reference),
                    _ => None,
                };

                let resolution = self.resolver.resolve(callee, kind);
                outcome.pruned += resolution.pruned;
                for target in resolution.targets {
                    if !outcome.callees.contains(&target) {
                        outcome.callees.push(target);
                    }
                }
            } else if let Some(allocation) = classify(self.provider, body, index) {
                outcome.allocations.push(allocation);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::allocation::AllocationKind,
        metadata::{
            method::{Instruction, MethodFlags, MethodSignature, OpCode},
            module::ModuleBuilder,
            typesystem::TypeReference,
        },
        test::{create_external_method, create_widget_module},
    };

    #[test]
    fn widget_bodies() {
        let widgets = create_widget_module();
        let config = ScanConfig::default();
        let scanner = MethodScanner::new(&widgets.module, &config);

        let main = scanner.scan(widgets.module.method_def(widgets.main).unwrap());
        assert!(main.allocations.is_empty());
        assert_eq!(main.callees, vec![widgets.make_widget]);
        assert_eq!(main.pruned, 1);

        let make_widget = scanner.scan(widgets.module.method_def(widgets.make_widget).unwrap());
        assert_eq!(make_widget.allocations.len(), 1);
        assert_eq!(make_widget.allocations[0].kind, AllocationKind::ConstructObject);
        // constructors are not traversed
        assert!(make_widget.callees.is_empty());
    }

    #[test]
    fn repeated_calls_are_reported_once() {
        let mut builder = ModuleBuilder::new("Repeat");
        let program = builder.add_class("Demo", "Program");
        let main = builder
            .add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)
            .unwrap();
        let helper = builder
            .add_method(program, "Helper", MethodSignature::void(), MethodFlags::STATIC)
            .unwrap();
        let helper_ref = builder.method_ref(helper).unwrap();
        builder
            .set_body(
                main,
                vec![
                    Instruction::call(0, helper_ref.clone()),
                    Instruction::boxing(5, TypeReference::value_type("System", "Int32")),
                    Instruction::call(10, helper_ref),
                    Instruction::call(15, create_external_method("Vendor", "Log", "Write")),
                    Instruction::new(20, OpCode::Calli, Operand::None),
                ],
            )
            .unwrap();
        builder.set_body(helper, vec![Instruction::other(0)]).unwrap();
        let module = builder.build();

        let config = ScanConfig::default();
        let outcome = MethodScanner::new(&module, &config).scan(module.method_def(main).unwrap());

        assert_eq!(outcome.callees, vec![helper]);
        assert_eq!(outcome.allocations.len(), 1);
        assert_eq!(outcome.allocations[0].type_name, "System.Int32");
        assert_eq!(outcome.pruned, 2);
    }

    #[test]
    fn bodiless_method() {
        let mut builder = ModuleBuilder::new("Abstract");
        let shape = builder.add_class("Demo", "Shape");
        let area = builder
            .add_method(shape, "Area", MethodSignature::void(), MethodFlags::ABSTRACT)
            .unwrap();
        let module = builder.build();

        let config = ScanConfig::default();
        let outcome = MethodScanner::new(&module, &config).scan(module.method_def(area).unwrap());
        assert_eq!(outcome, ScanOutcome::default());
    }
}

//! The call-graph traversal.
//!
//! The traversal keeps two ordered maps keyed by [`MethodIdentity`]: methods
//! waiting to be scanned and methods already scanned. It repeatedly takes the
//! pending method with the smallest identity, scans it, and queues every callee
//! it has not seen yet, recording the scanned method as that callee's caller.
//!
//! A method is scanned at most once, and the first method to discover a callee
//! stays its caller for the rest of the run. Processing in identity order makes
//! both the set of caller chains and the report independent of hash seeds or
//! instruction order ties.

use std::collections::BTreeMap;

use log::{debug, info, trace};

use crate::{
    analysis::{allocation::AllocationKind, record::MethodRecord, scanner::MethodScanner},
    config::ScanConfig,
    metadata::{identity::MethodIdentity, provider::MetadataProvider, token::Token},
    Error, Result,
};

/// Counters collected over one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Number of methods scanned
    pub methods_scanned: usize,
    /// Number of scanned methods with at least one allocation
    pub methods_with_allocations: usize,
    /// `newobj` sites on reference types
    pub objects: usize,
    /// `newarr` sites
    pub arrays: usize,
    /// `box` sites
    pub boxes: usize,
    /// Call candidates dropped because they were excluded, external or bodiless
    pub pruned_edges: usize,
}

impl ScanStats {
    /// Total number of allocation sites.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.objects + self.arrays + self.boxes
    }

    /// Number of allocation sites of `kind`.
    #[must_use]
    pub fn count(&self, kind: AllocationKind) -> usize {
        match kind {
            AllocationKind::ConstructObject => self.objects,
            AllocationKind::AllocateArray => self.arrays,
            AllocationKind::BoxValue => self.boxes,
        }
    }

    fn record(&mut self, kind: AllocationKind) {
        match kind {
            AllocationKind::ConstructObject => self.objects += 1,
            AllocationKind::AllocateArray => self.arrays += 1,
            AllocationKind::BoxValue => self.boxes += 1,
        }
    }
}

/// The scanned methods of one traversal, in identity order.
#[derive(Debug, Clone)]
pub struct ScanReport {
    root: MethodIdentity,
    records: BTreeMap<MethodIdentity, MethodRecord>,
    stats: ScanStats,
}

impl ScanReport {
    /// Identity of the method the traversal started from.
    #[must_use]
    pub fn root(&self) -> &MethodIdentity {
        &self.root
    }

    /// Number of scanned methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if nothing was scanned. Never the case for a successful run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All scanned methods in identity order.
    pub fn records(&self) -> impl Iterator<Item = &MethodRecord> {
        self.records.values()
    }

    /// The scanned method with the given identity.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&MethodRecord> {
        self.records.get(identity)
    }

    /// The callers of `record`, immediate caller first, ending at the root.
    #[must_use]
    pub fn caller_chain<'r>(&'r self, record: &'r MethodRecord) -> Vec<&'r MethodIdentity> {
        let mut chain = Vec::new();
        let mut next = record.caller.as_ref();
        while let Some(caller) = next {
            // callers are completed before their callees are discovered
            if chain.len() >= self.records.len() {
                break;
            }
            chain.push(caller);
            next = self
                .records
                .get(caller.as_str())
                .and_then(|record| record.caller.as_ref());
        }
        chain
    }

    /// Counters of the traversal.
    #[must_use]
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

/// Drives the traversal from a root method.
///
/// # Examples
///
/// ```rust
/// use allocscope::prelude::*;
///
/// let mut builder = ModuleBuilder::new("Demo");
/// let program = builder.add_class("Demo", "Program");
/// let main = builder.add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)?;
/// builder.set_body(main, vec![Instruction::newarr(0, TypeReference::value_type("System", "Byte"))])?;
/// let module = builder.build();
///
/// let report = Worklist::new(&module, ScanConfig::default()).run("Program", "Main")?;
/// assert_eq!(report.len(), 1);
/// assert_eq!(report.stats().arrays, 1);
/// # Ok::<(), allocscope::Error>(())
/// ```
pub struct Worklist<'a, P: ?Sized> {
    provider: &'a P,
    config: ScanConfig,
}

impl<'a, P> Worklist<'a, P>
where
    P: MetadataProvider + ?Sized,
{
    /// Creates a traversal over `provider`.
    pub fn new(provider: &'a P, config: ScanConfig) -> Self {
        Worklist { provider, config }
    }

    /// Looks up the root method by type and method name and runs the traversal.
    ///
    /// A type name containing a `.` is matched against full names, anything
    /// else against simple names; the first match wins. The first method of
    /// that type with the given name becomes the root.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] or [`Error::MethodNotFound`] if the root
    /// cannot be found. Nothing is scanned in that case.
    pub fn run(&self, type_name: &str, method_name: &str) -> Result<ScanReport> {
        let Some(ty) = self.provider.find_type(type_name) else {
            return Err(Error::TypeNotFound(type_name.to_string()));
        };
        let Some(method) = self.provider.find_method(ty.token, method_name) else {
            return Err(Error::MethodNotFound {
                method: method_name.to_string(),
                type_name: ty.full_name(),
            });
        };

        self.run_from(method.token)
    }

    /// Runs the traversal from the method definition `root`.
    ///
    /// The root is scanned even when its namespace is excluded; a root without
    /// a body yields a report with a single, empty record.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `root` is not a method of the module.
    pub fn run_from(&self, root: Token) -> Result<ScanReport> {
        let Some(root_identity) = self.provider.method_identity(root) else {
            return Err(Error::TokenNotFound(root));
        };

        let scanner = MethodScanner::new(self.provider, &self.config);
        let mut stats = ScanStats::default();
        let mut pending: BTreeMap<MethodIdentity, MethodRecord> = BTreeMap::new();
        let mut completed: BTreeMap<MethodIdentity, MethodRecord> = BTreeMap::new();

        pending.insert(
            root_identity.clone(),
            MethodRecord::new(root_identity.clone(), root, None),
        );

        while let Some((identity, mut record)) = pending.pop_first() {
            let Some(definition) = self.provider.method_def(record.token) else {
                return Err(Error::TokenNotFound(record.token));
            };

            debug!("Scanning {}", identity);
            let outcome = scanner.scan(definition);

            stats.methods_scanned += 1;
            stats.pruned_edges += outcome.pruned;
            for allocation in &outcome.allocations {
                stats.record(allocation.kind);
            }
            if !outcome.allocations.is_empty() {
                stats.methods_with_allocations += 1;
            }

            record.allocations = outcome.allocations;
            completed.insert(identity.clone(), record);

            for callee in outcome.callees {
                let Some(callee_identity) = self.provider.method_identity(callee) else {
                    trace!("{} has no identity, pruned", callee);
                    stats.pruned_edges += 1;
                    continue;
                };
                if completed.contains_key(callee_identity) || pending.contains_key(callee_identity)
                {
                    continue;
                }

                pending.insert(
                    callee_identity.clone(),
                    MethodRecord::new(callee_identity.clone(), callee, Some(identity.clone())),
                );
            }
        }

        info!(
            "Scanned {} methods from {}, found {} allocation sites in {} of them",
            stats.methods_scanned,
            root_identity,
            stats.allocations(),
            stats.methods_with_allocations
        );

        Ok(ScanReport {
            root: root_identity.clone(),
            records: completed,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            method::{Instruction, MethodFlags, MethodSignature},
            module::ModuleBuilder,
        },
        test::create_widget_module,
    };

    #[test]
    fn widget_traversal() {
        let widgets = create_widget_module();
        let report = Worklist::new(&widgets.module, ScanConfig::default())
            .run("Program", "Main")
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.root().as_str(), "System.Void Demo.Program::Main()");

        let make_widget = report.get("Demo.Widget Demo.Factory::MakeWidget()").unwrap();
        assert_eq!(make_widget.allocations.len(), 1);
        assert_eq!(
            make_widget.caller.as_ref().map(MethodIdentity::as_str),
            Some("System.Void Demo.Program::Main()")
        );
        assert_eq!(report.caller_chain(make_widget).len(), 1);

        let stats = report.stats();
        assert_eq!(stats.methods_scanned, 2);
        assert_eq!(stats.methods_with_allocations, 1);
        assert_eq!(stats.count(AllocationKind::ConstructObject), 1);
        assert_eq!(stats.pruned_edges, 1);
    }

    #[test]
    fn qualified_lookup() {
        let widgets = create_widget_module();
        let worklist = Worklist::new(&widgets.module, ScanConfig::default());

        assert!(worklist.run("Demo.Program", "Main").is_ok());
        assert!(matches!(
            worklist.run("Other.Program", "Main"),
            Err(Error::TypeNotFound(name)) if name == "Other.Program"
        ));
        assert!(matches!(
            worklist.run("Program", "Run"),
            Err(Error::MethodNotFound { method, type_name })
                if method == "Run" && type_name == "Demo.Program"
        ));
        assert!(matches!(
            worklist.run_from(Token::method_def(99)),
            Err(Error::TokenNotFound(_))
        ));
    }

    #[test]
    fn recursion_terminates() {
        let mut builder = ModuleBuilder::new("Recursion");
        let program = builder.add_class("Demo", "Program");
        let even = builder
            .add_method(program, "Even", MethodSignature::void(), MethodFlags::STATIC)
            .unwrap();
        let odd = builder
            .add_method(program, "Odd", MethodSignature::void(), MethodFlags::STATIC)
            .unwrap();
        let even_ref = builder.method_ref(even).unwrap();
        let odd_ref = builder.method_ref(odd).unwrap();
        builder
            .set_body(even, vec![Instruction::call(0, odd_ref), Instruction::call(5, even_ref.clone())])
            .unwrap();
        builder
            .set_body(odd, vec![Instruction::call(0, even_ref)])
            .unwrap();
        let module = builder.build();

        let report = Worklist::new(&module, ScanConfig::default())
            .run("Program", "Even")
            .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.stats().methods_scanned, 2);

        let odd = report.get("System.Void Demo.Program::Odd()").unwrap();
        assert_eq!(
            report
                .caller_chain(odd)
                .iter()
                .map(|identity| identity.as_str())
                .collect::<Vec<_>>(),
            vec!["System.Void Demo.Program::Even()"]
        );
    }

    #[test]
    fn bodiless_root() {
        let mut builder = ModuleBuilder::new("Abstract");
        let shape = builder.add_class("System.Drawing", "Shape");
        builder
            .add_method(shape, "Area", MethodSignature::void(), MethodFlags::ABSTRACT)
            .unwrap();
        let module = builder.build();

        let report = Worklist::new(&module, ScanConfig::default())
            .run("Shape", "Area")
            .unwrap();
        assert_eq!(report.len(), 1);
        assert!(!report.records().any(MethodRecord::has_allocations));
    }
}

//! Rendering of scan results.
//!
//! Every scanned method with at least one allocation becomes one block, in
//! identity order:
//!
//! ```text
//! ---------------------------------------
//! Demo.Widget Demo.Factory::MakeWidget()
//!   System.Void Demo.Program::Main()
//! widget.cs:10: new Demo.Widget
//! ```
//!
//! The dash line is as long as the identity. Callers follow with an indent
//! growing by two spaces per level, immediate caller first. Allocation lines
//! are ordered by source line; the `file:line: ` prefix is left out when the
//! position is unknown.

use std::{fmt, io};

use crate::analysis::{AllocationKind, AllocationRecord, MethodRecord, ScanReport};

const COLOR_ALLOCATION: &str = "\x1b[31m";
const COLOR_RESET: &str = "\x1b[0m";

/// One allocation line of a [`ReportEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAllocation {
    /// Allocation kind
    pub kind: AllocationKind,
    /// Full name of the allocated type
    pub type_name: String,
    /// IL offset of the allocating instruction
    pub offset: u32,
    /// Source document, if known
    pub document: Option<String>,
    /// Source line, if known
    pub line: Option<u32>,
}

impl From<&AllocationRecord> for ReportAllocation {
    fn from(record: &AllocationRecord) -> Self {
        ReportAllocation {
            kind: record.kind,
            type_name: record.type_name.clone(),
            offset: record.offset,
            document: record.position.as_ref().map(|p| p.document.clone()),
            line: record.position.as_ref().map(|p| p.line),
        }
    }
}

impl fmt::Display for ReportAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(document), Some(line)) = (&self.document, self.line) {
            write!(f, "{document}:{line}: ")?;
        }
        write!(f, "{} {}", self.kind, self.type_name)
    }
}

/// One rendered block: a method, its callers and its allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Identity of the method
    pub method: String,
    /// Caller identities, immediate caller first
    pub callers: Vec<String>,
    /// Allocations ordered by source line
    pub allocations: Vec<ReportAllocation>,
}

/// Writes a [`ScanReport`] as text.
///
/// # Examples
///
/// ```rust
/// use allocscope::prelude::*;
///
/// let mut builder = ModuleBuilder::new("Demo");
/// let program = builder.add_class("Demo", "Program");
/// let main = builder.add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)?;
/// builder.set_body(main, vec![
///     Instruction::boxing(0, TypeReference::value_type("System", "Int32")).at("Program.cs", 4),
/// ])?;
/// let module = builder.build();
///
/// let report = Worklist::new(&module, ScanConfig::default()).run("Program", "Main")?;
/// assert_eq!(
///     Reporter::new(&report).render(),
///     "--------------------------------\n\
///      System.Void Demo.Program::Main()\n\
///      Program.cs:4: box System.Int32\n"
/// );
/// # Ok::<(), allocscope::Error>(())
/// ```
pub struct Reporter<'a> {
    report: &'a ScanReport,
    color: bool,
}

impl<'a> Reporter<'a> {
    /// Creates an uncolored reporter.
    #[must_use]
    pub fn new(report: &'a ScanReport) -> Self {
        Reporter {
            report,
            color: false,
        }
    }

    /// Wraps allocation lines in ANSI dark red when `color` is set.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn entry(&self, record: &MethodRecord) -> ReportEntry {
        ReportEntry {
            method: record.identity.to_string(),
            callers: self
                .report
                .caller_chain(record)
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            allocations: record
                .allocations_by_line()
                .into_iter()
                .map(ReportAllocation::from)
                .collect(),
        }
    }

    /// The report in structured form, one entry per method with allocations.
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.report
            .records()
            .filter(|record| record.has_allocations())
            .map(|record| self.entry(record))
            .collect()
    }

    /// Writes the text report to `out`.
    ///
    /// # Errors
    /// Returns the first error of the underlying writer.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for record in self.report.records().filter(|record| record.has_allocations()) {
            writeln!(out, "{}", "-".repeat(record.identity.char_len()))?;
            writeln!(out, "{}", record.identity)?;

            let mut indent = String::from("  ");
            for caller in self.report.caller_chain(record) {
                writeln!(out, "{indent}{caller}")?;
                indent.push_str("  ");
            }

            for allocation in record.allocations_by_line() {
                let line = ReportAllocation::from(allocation);
                if self.color {
                    writeln!(out, "{COLOR_ALLOCATION}{line}{COLOR_RESET}")?;
                } else {
                    writeln!(out, "{line}")?;
                }
            }
        }

        Ok(())
    }

    /// The text report as a string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ScanConfig, test::create_widget_module, Worklist};

    #[test]
    fn widget_report() {
        let widgets = create_widget_module();
        let report = Worklist::new(&widgets.module, ScanConfig::default())
            .run("Program", "Main")
            .unwrap();

        let text = Reporter::new(&report).render();
        let expected = format!(
            "{}\n\
             Demo.Widget Demo.Factory::MakeWidget()\n  \
             System.Void Demo.Program::Main()\n\
             widget.cs:10: new Demo.Widget\n",
            "-".repeat("Demo.Widget Demo.Factory::MakeWidget()".len())
        );
        assert_eq!(text, expected);

        let colored = Reporter::new(&report).with_color(true).render();
        assert!(colored.contains("\x1b[31mwidget.cs:10: new Demo.Widget\x1b[0m\n"));
    }

    #[test]
    fn entries_match_text() {
        let widgets = create_widget_module();
        let report = Worklist::new(&widgets.module, ScanConfig::default())
            .run("Program", "Main")
            .unwrap();

        let entries = Reporter::new(&report).entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method, "Demo.Widget Demo.Factory::MakeWidget()");
        assert_eq!(entries[0].callers, vec!["System.Void Demo.Program::Main()"]);
        assert_eq!(entries[0].allocations[0].line, Some(10));
        assert_eq!(entries[0].allocations[0].to_string(), "widget.cs:10: new Demo.Widget");
    }

    #[test]
    fn allocation_without_position() {
        let allocation = ReportAllocation {
            kind: AllocationKind::BoxValue,
            type_name: "System.Int32".to_string(),
            offset: 3,
            document: None,
            line: None,
        };
        assert_eq!(allocation.to_string(), "box System.Int32");
    }
}

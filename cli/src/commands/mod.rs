use std::process::exit;

use camino::Utf8Path;
use clap::Parser;
use lc3b_emulator::assembler::{assemble_with, AssemblyError, Options, Program};
use miette::{Diagnostic, LabeledSpan, MietteDiagnostic, NamedSource, Report};
use tracing::{debug, info};

mod assemble;
mod completion;
mod run;

#[derive(Parser, Debug)]
pub enum Subcommand {
    /// Assemble and run a program
    Run(self::run::RunOpt),

    /// Assemble a program and show the listing
    Assemble(self::assemble::AssembleOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Assemble(opt) => opt.exec(),
            Self::Completion(opt) => opt.exec(),
        }
    }
}

/// Byte range of a line in the source, lines starting at 1
fn line_span(source: &str, line: usize) -> std::ops::Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let text = text.trim_end_matches(['\n', '\r']);
            return start..start + text.len();
        }
        start += text.len();
    }

    start..start
}

/// Build a report pointing at the line where assembly failed
fn report(path: &Utf8Path, source: &str, error: &AssemblyError) -> Report {
    let span = line_span(source, error.line);
    let mut diagnostic = MietteDiagnostic::new("Failed to assemble program")
        .with_label(LabeledSpan::at(span, error.kind.to_string()));

    if let Some(code) = error.kind.code() {
        diagnostic = diagnostic.with_code(code.to_string());
    }

    if let Some(help) = error.kind.help() {
        diagnostic = diagnostic.with_help(help.to_string());
    }

    Report::new(diagnostic).with_source_code(NamedSource::new(path.as_str(), source.to_owned()))
}

/// Read and assemble a file, reporting errors against the source
pub(crate) fn assemble_file(path: &Utf8Path, strict: bool) -> anyhow::Result<Program> {
    info!(%path, "Reading program");
    let source = std::fs::read_to_string(path)?;

    let options = Options {
        require_orig: strict,
        ..Options::default()
    };

    debug!("Assembling program");
    match assemble_with(&source, &options) {
        Ok(program) => Ok(program),
        Err(error) => {
            let report = report(path, &source, &error);
            eprintln!("{report:?}");
            exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn line_span_test() {
        let source = "first\r\nsecond line\nthird";
        assert_eq!(&source[line_span(source, 1)], "first");
        assert_eq!(&source[line_span(source, 2)], "second line");
        assert_eq!(&source[line_span(source, 3)], "third");
        assert_eq!(line_span(source, 4), source.len()..source.len());
    }

    #[test]
    fn report_test() {
        let source = ".ORIG x3000\n  BRz nowhere\n.END\n";
        let error = lc3b_emulator::assemble(source).unwrap_err();
        let report = report(Utf8Path::new("prog.asm"), source, &error);

        let labels: Vec<_> = report.labels().into_iter().flatten().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 12);
        assert_eq!(labels[0].len(), "  BRz nowhere".len());
        assert_eq!(labels[0].label(), Some("undefined label `nowhere`"));
        assert_eq!(
            report.code().map(|code| code.to_string()),
            Some("asm::undefined_label".to_owned())
        );
    }
}

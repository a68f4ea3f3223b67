mod app;
mod loader;
mod output;

use std::{io::Write, process::ExitCode};

use clap::{error::ErrorKind, Parser};

use allocscope::{Reporter, ScanConfig, Worklist};

use crate::{
    app::{Cli, USAGE},
    output::{print_output, ReportOutput},
};

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = err.print();
                return ExitCode::SUCCESS;
            }
            println!("{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Show allocscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.json {
        let level = if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("allocscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let module = loader::load_module(&cli.module, cli.pdb_path())?;

    let config = if cli.exclude.is_empty() {
        ScanConfig::default()
    } else {
        ScanConfig::default().with_excluded_namespaces(cli.exclude.iter().cloned())
    };

    let report = Worklist::new(&module, config).run(&cli.type_name, &cli.method)?;
    let reporter = Reporter::new(&report).with_color(cli.color.enabled());

    let output = ReportOutput::new(&report, reporter.entries());
    print_output(&output, cli.json, |_| {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        reporter.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    })
}

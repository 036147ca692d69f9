use std::io::Write;
use std::path::PathBuf;

use console::Style;

use crate::aggregator::{Completion, Report};
use crate::catalog::{self, Catalog};
use crate::error::Result;
use crate::mutants::{MutantResult, Verdict};
use crate::state::{RunResult, SurvivedMutant};

/// Where a finished report goes.
pub trait ReportSink {
    fn emit(&mut self, report: &Report) -> Result<()>;
}

/// Pretty JSON to a file, or to stdout when no path is set.
pub struct JsonSink {
    path: Option<PathBuf>,
}

impl JsonSink {
    pub fn stdout() -> Self {
        Self { path: None }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ReportSink for JsonSink {
    fn emit(&mut self, report: &Report) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        match &self.path {
            Some(path) => std::fs::write(path, json)?,
            None => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", json)?;
            }
        }
        Ok(())
    }
}

/// Styled terminal summary with survivors listed by ref.
#[derive(Default)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn emit(&mut self, report: &Report) -> Result<()> {
        print_run_result(&RunResult::from_report(report), report);
        Ok(())
    }
}

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// One line per finished mutant while a run is in progress.
pub fn print_progress(result: &MutantResult) {
    let style = match result.verdict {
        Verdict::Killed(_) => Style::new().green(),
        Verdict::Survived(_) => Style::new().yellow().bold(),
        Verdict::Equivalent(_) => Style::new().dim(),
        Verdict::Error(_) => Style::new().red(),
    };
    eprintln!(
        "  {} {}:{} [{}]",
        style.apply_to(format!("{:<28}", result.verdict.label())),
        result.id.path,
        result.line,
        result.id.operator,
    );
}

fn print_run_result(result: &RunResult, report: &Report) {
    let score_pct = result.score * 100.0;
    let judged = result.killed + result.survived;

    match &result.completion {
        Completion::Complete => {}
        Completion::Cancelled => {
            let style = Style::new().yellow().bold();
            println!(
                "{} Run cancelled, {} mutants left unclassified",
                style.apply_to("!"),
                result.unclassified
            );
        }
        Completion::Aborted(reason) => {
            print_error(&format!("Run aborted: {}", reason));
        }
    }

    if result.survived == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {} mutants, all killed ({:.1}%) in {:.1}s",
            style.apply_to("✓"),
            judged,
            score_pct,
            result.duration_ms as f64 / 1000.0,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {} survived / {} judged ({:.1}% killed) in {:.1}s",
            style.apply_to("!"),
            result.survived,
            judged,
            score_pct,
            result.duration_ms as f64 / 1000.0,
        );
    }

    let dim = Style::new().dim();
    if result.equivalent > 0 {
        println!("  {} {} equivalent mutants skipped", dim.apply_to("·"), result.equivalent);
    }
    if result.survived_untested > 0 {
        println!(
            "  {} {} survivors had no covering tests",
            dim.apply_to("·"),
            result.survived_untested
        );
    }
    if result.errors > 0 {
        println!("  {} {} mutants errored", dim.apply_to("·"), result.errors);
    }
    for failure in &report.parse_failures {
        println!("  {} parse error: {}", dim.apply_to("·"), failure);
    }

    if result.survived_mutants.is_empty() {
        return;
    }
    println!();
    for m in &result.survived_mutants {
        let ref_style = Style::new().cyan().bold();
        let loc_style = Style::new().dim();
        let op_style = Style::new().magenta();

        println!(
            "  {} {}:{} {} {} → {}{}",
            ref_style.apply_to(format!("@{}", m.ref_id)),
            m.file,
            m.line,
            loc_style.apply_to(format!("[{}]", m.operator)),
            op_style.apply_to(&m.original),
            op_style.apply_to(&m.replacement),
            if m.untested { " (untested)" } else { "" },
        );
    }
}

pub fn print_mutant_detail(m: &SurvivedMutant) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{} {}:{}:{} [{}]",
        ref_style.apply_to(format!("@{}", m.ref_id)),
        m.file,
        m.line,
        m.column,
        m.operator,
    );
    if m.untested {
        println!("  {}", dim.apply_to("no test covers this line"));
    } else {
        println!("  {}", dim.apply_to(format!("tests run: {}", m.tests_run.join(", "))));
    }
    println!();

    for line in &m.context_before {
        println!("  {}", dim.apply_to(line));
    }

    for line in m.diff.lines() {
        if line.starts_with('-') {
            let del_style = Style::new().red();
            println!("  {}", del_style.apply_to(line));
        } else if line.starts_with('+') {
            let add_style = Style::new().green();
            println!("  {}", add_style.apply_to(line));
        }
    }

    for line in &m.context_after {
        println!("  {}", dim.apply_to(line));
    }
}

pub fn print_status(result: &RunResult) {
    let score_pct = result.score * 100.0;

    println!(
        "Last run: {} mutants, {} killed, {} survived, {} equivalent ({:.1}% score)",
        result.total, result.killed, result.survived, result.equivalent, score_pct,
    );
    if let Completion::Aborted(reason) = &result.completion {
        println!("Aborted: {}", reason);
    }

    if result.survived > 0 {
        println!();
        for m in &result.survived_mutants {
            let ref_style = Style::new().cyan().bold();
            println!(
                "  {} {}:{} {} → {}",
                ref_style.apply_to(format!("@{}", m.ref_id)),
                m.file,
                m.line,
                m.original,
                m.replacement,
            );
        }
        println!();
        println!("Use `mutscope show @m1` for details on a specific mutant.");
    }
}

/// Every built-in, marked by whether `selected` runs it.
pub fn print_operators(selected: &Catalog) {
    let name_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    for op in catalog::builtin_operators() {
        let enabled = selected.get(op.name()).is_some();
        println!(
            "  {} {:<24} {}",
            if enabled { "●" } else { "○" },
            name_style.apply_to(op.name()),
            dim.apply_to(op.description()),
        );
    }
}

//! Lines printed to stdout as the run progresses.

use libprobe_library::{LibraryReport, LibraryStatus, RunEvent, Summary};
use std::collections::BTreeSet;

fn list(names: &BTreeSet<String>) -> String {
    format!("[{}]", names.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}

pub fn library_line(report: &LibraryReport) -> String {
    let mut line = format!(
        "Library {} depends on: {} provided by lib manager and {} provided by cores or built-in",
        report.name,
        list(&report.dependencies.external),
        list(&report.dependencies.local),
    );
    match &report.status {
        LibraryStatus::Compiled => {},
        LibraryStatus::Failed(failure) => {
            line.push_str(&format!(" but failed to compile on {} ({failure})", report.selection.profile));
        },
        LibraryStatus::Unprepared(reason) => line.push_str(&format!(" but was not probed ({reason})")),
    }
    line
}

pub fn examples_line(report: &LibraryReport) -> Option<String> {
    let examples = report.examples.as_ref()?;
    let mut line = format!("Examples for {}: {} probed", report.name, examples.probed);
    if !examples.is_success() {
        line.push_str(&format!(", {} failed to compile on {}", examples.failed(), report.selection.profile));
    }
    Some(line)
}

pub fn summary_line(summary: &Summary) -> String {
    let mut line = format!("Processed {} libraries ({} failed)", summary.processed, summary.failed);
    if summary.failed_examples > 0 {
        line.push_str(&format!(", {} examples failed", summary.failed_examples));
    }
    line.push_str(&format!(
        ", skipped {}, {} installed libraries not in the catalog",
        summary.skipped, summary.uncatalogued
    ));
    line
}

pub fn print(event: &RunEvent) {
    match event {
        RunEvent::Finalized(report) => {
            println!("{}", library_line(report));
            if let Some(line) = examples_line(report) {
                println!("{line}");
            }
        },
        RunEvent::Complete(summary) => println!("{}", summary_line(summary)),
        RunEvent::Started | RunEvent::DiscoveryComplete { .. } | RunEvent::Skipped(_) => {},
    }
}

use fixtures::*;

use pretty_assertions::assert_eq;
use wdi_trace::{
    ClassifiedTrace, EventCategory, ReportSettings, TraceParser, TraceReport, md5_file,
};

fn classify(path: &std::path::Path) -> ClassifiedTrace {
    let events = TraceParser::from_path(path)
        .unwrap()
        .parse_events()
        .unwrap();
    ClassifiedTrace::from_events(&events)
}

#[test]
fn test_boot_trace_records() {
    ensure_env_logger_initialized();
    let trace = classify(&boot_trace_sample());

    let actual: Vec<String> = trace
        .records()
        .map(|record| serde_json::to_string(&record).unwrap())
        .collect();

    let expected: Vec<String> = include_str!("../samples/boot_trace_records.jsonl")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();

    assert_eq!(actual, expected);
}

#[test]
fn test_boot_trace_counters() {
    ensure_env_logger_initialized();
    let trace = classify(&boot_trace_sample());
    let stats = trace.stats();

    insta::assert_snapshot!(
        format!(
            "total={} skipped={} uncategorized={} classified={}",
            stats.total,
            stats.skipped,
            stats.uncategorized,
            stats.classified()
        ),
        @"total=11 skipped=1 uncategorized=1 classified=9"
    );

    assert_eq!(trace.len(EventCategory::DiskIo), 3);
    assert_eq!(trace.len(EventCategory::ImageLoad), 1);
    assert_eq!(trace.len(EventCategory::Thread), 2);
    assert_eq!(trace.len(EventCategory::Process), 3);
    assert_eq!(trace.total(), stats.classified());
}

#[test]
fn test_rooted_and_declared_trace_parses_the_same() {
    ensure_env_logger_initialized();
    let trace = classify(&process_only_sample());

    assert_eq!(trace.processes.len(), 1);
    assert_eq!(trace.processes[0].image_name, "System");
    assert_eq!(trace.processes[0].pid, "4");
    assert_eq!(trace.stats().uncategorized, 1);
}

#[test]
fn test_malformed_trace_is_an_error() {
    ensure_env_logger_initialized();
    let parser = TraceParser::from_path(malformed_sample()).unwrap();
    assert!(parser.parse_events().is_err());

    assert!(TraceReport::from_path(malformed_sample(), ReportSettings::new()).is_err());
}

#[test]
fn test_runs_are_idempotent() {
    ensure_env_logger_initialized();
    let first = TraceReport::from_path(boot_trace_sample(), ReportSettings::new()).unwrap();
    let second = TraceReport::from_path(boot_trace_sample(), ReportSettings::new()).unwrap();

    assert_eq!(first.trace, second.trace);
    assert_eq!(first.source_digest, second.source_digest);
    assert_eq!(first.source_digest, md5_file(boot_trace_sample()).unwrap());
    assert_eq!(first.case_id, "boot_trace");

    let analyzed_at = jiff::civil::date(2024, 6, 1).at(12, 0, 0, 0);
    assert_eq!(
        first.render_pages(analyzed_at).unwrap(),
        second.render_pages(analyzed_at).unwrap()
    );
}

#[test]
fn test_every_page_carries_all_processes() {
    ensure_env_logger_initialized();
    let report = TraceReport::from_path(
        boot_trace_sample(),
        ReportSettings::new().chunk_size(1),
    )
    .unwrap();

    let pagination = report.pagination().unwrap();
    assert_eq!(pagination.total_pages(), 3);

    for page in pagination.pages() {
        assert_eq!(page.processes.len(), 3);
        assert!(page.disk_io.len() <= 1);
    }

    let pages = report
        .render_pages(jiff::civil::date(2024, 6, 1).at(12, 0, 0, 0))
        .unwrap();
    let names: Vec<&str> = pages.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "boot_trace_Part_1.html",
            "boot_trace_Part_2.html",
            "boot_trace_Part_3.html"
        ]
    );
    for (_, html) in &pages {
        assert!(html.contains("csrss.exe"));
        assert!(html.contains(&report.source_digest));
    }
}

#[test]
fn test_generated_trace_is_split_by_chunk() {
    ensure_env_logger_initialized();
    let d = tempfile::tempdir().unwrap();
    let source = d.path().join("generated.xml");
    std::fs::write(&source, generated_disk_trace(25)).unwrap();

    let report = TraceReport::from_path(&source, ReportSettings::new().chunk_size(10)).unwrap();
    let pagination = report.pagination().unwrap();
    assert_eq!(pagination.total_pages(), 3);

    let last = pagination.pages().last().unwrap();
    assert_eq!(last.disk_io.len(), 5);
    assert!(last.threads.is_empty());
    assert_eq!(last.processes.len(), 1);
}

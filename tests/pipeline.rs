use std::io::Write;

use mrsent::aggregate::Sums;
use mrsent::pipeline::{file_size, process_range, run_local};
use mrsent::{ByteRange, RangeReader, Report};
use serde_json::json;
use tempfile::NamedTempFile;

const TOLERANCE: f64 = 1e-9;

fn record(created_at: &str, sentiment: f64, id: &str, username: &str) -> String {
    json!({
        "id": "evt",
        "doc": {
            "createdAt": created_at,
            "sentiment": sentiment,
            "account": { "id": id, "username": username, "acct": username },
            "content": "some text, with \"quotes\" and unicode: ✓",
        }
    })
    .to_string()
}

fn write_lines(lines: &[String], trailing_newline: bool) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let mut body = lines.join("\n");
    if trailing_newline {
        body.push('\n');
    }
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn assert_sums_close(actual: &Sums, expected: &Sums) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (key, value) in expected {
        let got = actual.get(key).unwrap_or_else(|| panic!("missing key {}", key));
        assert!((got - value).abs() < TOLERANCE, "{}: {} != {}", key, got, value);
    }
}

fn sums(entries: &[(&str, f64)]) -> Sums {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// A few hundred records across hours and users, with junk mixed in.
fn mixed_corpus() -> Vec<String> {
    let users = [("alice", "1"), ("bob", "2"), ("alice", "3"), ("carol", "44")];
    let mut lines = Vec::new();
    for i in 0..300u32 {
        let (name, id) = users[(i % 4) as usize];
        let hour = i % 24;
        // Quarters add up exactly, so rank order cannot flip between runs.
        let sentiment = ((i * 37) % 11) as f64 / 4.0 - 1.25;
        lines.push(record(&format!("2024-03-{:02}T{:02}:{:02}:00.000Z", 1 + i % 3, hour, i % 60), sentiment, id, name));
        if i % 17 == 0 {
            lines.push("{\"doc\": {\"createdAt\": ".to_string());
        }
        if i % 23 == 0 {
            lines.push(String::new());
        }
    }
    lines
}

#[tokio::test]
async fn scenario_from_three_records() {
    let lines = vec![
        record("2024-01-01T10:05:00Z", 5.0, "1", "alice"),
        record("2024-01-01T10:59:59Z", -3.0, "2", "bob"),
        record("2024-01-01T11:00:00Z", 2.0, "1", "alice"),
    ];
    let file = write_lines(&lines, true);
    let job = run_local(file.path(), 2).await.unwrap();

    assert_sums_close(&job.global.hour_sums, &sums(&[("2024-01-01T10", 2.0), ("2024-01-01T11", 2.0)]));
    assert_sums_close(&job.global.user_sums, &sums(&[("alice (1)", 7.0), ("bob (2)", -3.0)]));
    assert_eq!(job.stats.records_read, 3);
    assert_eq!(job.stats.records_dropped, 0);

    let report = Report::new(&job.global, 1);
    assert_eq!(report.happiest_hours[0].key, "2024-01-01T10");
    assert_eq!(report.saddest_hours[0].key, "2024-01-01T10");
    assert_eq!(report.happiest_users[0].key, "alice (1)");
    assert_eq!(report.saddest_users[0].key, "bob (2)");
}

#[tokio::test]
async fn result_does_not_depend_on_worker_count() {
    let file = write_lines(&mixed_corpus(), false);
    let baseline = run_local(file.path(), 1).await.unwrap();
    assert!(baseline.stats.records_dropped > 0);

    for workers in [2, 3, 7, 16, 64] {
        let job = run_local(file.path(), workers).await.unwrap();
        assert_sums_close(&job.global.hour_sums, &baseline.global.hour_sums);
        assert_sums_close(&job.global.user_sums, &baseline.global.user_sums);
        assert_eq!(job.stats, baseline.stats, "workers = {}", workers);
        assert_eq!(
            Report::new(&job.global, 5).to_string(),
            Report::new(&baseline.global, 5).to_string()
        );
    }
}

#[tokio::test]
async fn same_name_different_ids_stay_apart() {
    let lines = vec![
        record("2024-01-01T10:00:00Z", 1.0, "1", "alice"),
        record("2024-01-01T10:00:00Z", 1.0, "3", "alice"),
    ];
    let file = write_lines(&lines, true);
    let job = run_local(file.path(), 1).await.unwrap();
    assert_sums_close(&job.global.user_sums, &sums(&[("alice (1)", 1.0), ("alice (3)", 1.0)]));
}

#[tokio::test]
async fn dropped_lines_contribute_nothing() {
    let lines = vec![
        record("2024-01-01T10:00:00Z", 1.0, "1", "alice"),
        json!({"doc": {"createdAt": "2024-01-01T10:00:00Z", "sentiment": 9.0, "account": {"username": "noid"}}}).to_string(),
        record("not a timestamp", 9.0, "5", "eve"),
        "this is not json at all".to_string(),
        json!({"doc": {"createdAt": "2024-01-01T12:00:00Z", "account": {"id": 8, "username": "quiet"}}}).to_string(),
    ];
    let file = write_lines(&lines, true);
    let job = run_local(file.path(), 3).await.unwrap();
    assert_sums_close(&job.global.hour_sums, &sums(&[("2024-01-01T10", 1.0), ("2024-01-01T12", 0.0)]));
    assert_sums_close(&job.global.user_sums, &sums(&[("alice (1)", 1.0), ("quiet (8)", 0.0)]));
    assert_eq!(job.stats.records_read, 5);
    assert_eq!(job.stats.records_dropped, 3);
}

#[test]
fn every_record_read_exactly_once_on_disk() {
    let lines: Vec<String> = (0..40)
        .map(|i| format!("line-{}-{}", i, "x".repeat(i * 7 % 13)))
        .collect();
    let file = write_lines(&lines, true);
    let size = file_size(file.path()).unwrap();
    for workers in 1..=lines.len() as u32 {
        let mut seen = Vec::new();
        for range in ByteRange::all(size, workers).unwrap() {
            for record in RangeReader::open(file.path(), range).unwrap() {
                seen.push(String::from_utf8(record.unwrap()).unwrap());
            }
        }
        assert_eq!(seen, lines, "workers = {}", workers);
    }
}

#[test]
fn tiny_file_with_more_workers_than_bytes() {
    let file = write_lines(&[record("2024-01-01T10:00:00Z", 1.0, "1", "a")], false);
    let size = file_size(file.path()).unwrap();
    let workers = size as u32 + 5;
    let outputs: Vec<_> = ByteRange::all(size, workers)
        .unwrap()
        .into_iter()
        .map(|range| process_range(file.path(), range).unwrap())
        .collect();
    assert_eq!(outputs.iter().map(|o| o.stats.records_read).sum::<u64>(), 1);
}

#[tokio::test]
async fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run_local(dir.path().join("nope.ndjson"), 2).await.is_err());
    assert!(run_local(dir.path().join("nope.ndjson"), 0).await.is_err());
}

#[test]
fn range_past_end_of_file_is_fatal() {
    let file = write_lines(&["abc".to_string()], true);
    assert!(process_range(file.path(), ByteRange::new(0, 100)).is_err());
}

//! End-to-end tests: TSV file -> HTTP lookups -> output files
//!
//! A small local HTTP server stands in for the lookup service, so these
//! tests exercise the real source, client, config and sinks together.

mod common;

use common::{test_timeout, unique, within, OutputDir};
use enrich_rs::{EnrichConfig, HttpLookupClient, Outputs, Pipeline, TsvSource};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

/// Canned response body for an identifier
fn body_for(identifier: &str) -> &'static str {
    match identifier {
        "tt001" => r#"{"Title":"Heat","Country":"USA"}"#,
        "tt002" => r#"{"Title":"Ronin"}"#,
        "tt003" => r#"{"Title":"Alien","Country":"\"UK\""}"#,
        "tt004" => r#"{"Title":"Unknown","Country":"N/A"}"#,
        _ => r#"{"Response":"False"}"#,
    }
}

fn handle(stream: TcpStream) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" => break,
            Ok(_) => {}
        }
    }

    let identifier = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|target| target.split_once('?'))
        .and_then(|(_, query)| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("i=").map(str::to_string))
        })
        .unwrap_or_default();

    let body = body_for(&identifier);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
}

/// Start the fake service; it lives until the test process exits
fn start_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    url
}

fn config_for(out: &OutputDir, endpoint: String) -> EnrichConfig {
    let input = out.path().join("movies.tsv");
    std::fs::write(
        &input,
        "tt001\tHeat\t1995\ntt002\tRonin\t1998\ntt003\tAlien\t1979\ntt004\tUnknown\t2001\n",
    )
    .unwrap();

    let toml = format!(
        r#"
[pipeline]
worker_count = 3
work_queue_capacity = 2
result_queue_capacity = 2

[source]
path = {input:?}

[lookup]
endpoint = "{endpoint}"
api_key = "test-key"

[lookup.retry]
max_attempts = 2
initial_backoff_ms = 1

[output]
records_path = {records:?}
summary_path = {summary:?}
append = false
"#,
        input = input.display().to_string(),
        records = out.records_path().display().to_string(),
        summary = out.summary_path().display().to_string(),
    );
    let config = EnrichConfig::from_toml(&toml).unwrap();
    config.validate().unwrap();
    config
}

fn run(config: EnrichConfig) -> enrich_rs::Result<enrich_rs::RunReport> {
    within(test_timeout(), move || {
        let client = HttpLookupClient::from_config(&config.lookup);
        let source = TsvSource::open(&config.source)?;
        let outputs = Outputs::open(&config.output)?;
        Pipeline::from_config(&config, client).run(source, outputs)
    })
}

#[test]
fn test_file_to_file_run() {
    let out = OutputDir::new();
    let config = config_for(&out, start_service());

    let report = run(config).unwrap();
    assert_eq!(report.identifiers_read, 4);
    assert_eq!(report.lookups_failed, 0);

    assert_eq!(
        unique(&out.records()),
        HashSet::from([
            "tt001\tUSA".to_string(),
            "tt002\t\\N".to_string(),
            "tt003\tUK".to_string(),
            "tt004\t\\N".to_string(),
        ])
    );
    // Sorted on persist.
    assert_eq!(out.summary(), vec!["UK", "USA", "\\N"]);
}

#[test]
fn test_append_mode_accumulates_runs() {
    let out = OutputDir::new();
    let mut config = config_for(&out, start_service());
    config.output.append = true;

    run(config.clone()).unwrap();
    run(config).unwrap();

    assert_eq!(out.records().len(), 8);
}

#[test]
fn test_unreachable_service_fails_lookups_not_run() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let out = OutputDir::new();
    let report = run(config_for(&out, endpoint)).unwrap();

    assert_eq!(report.lookups_failed, 4);
    assert_eq!(report.retries, 4);
    assert!(out.records().is_empty());
    assert!(out.summary().is_empty());
}

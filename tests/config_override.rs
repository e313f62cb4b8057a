use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar(config: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_edutrackd");
    let mut child = Command::new(exe)
        .env("EDUTRACKD_CONFIG", config)
        .env_remove("EDUTRACKD_STATS_SCOPE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn edutrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn config_file_adds_profiles_and_sets_default_scope() {
    let dir = tempfile::tempdir().expect("temp dir");
    let cfg_path = dir.path().join("edutrackd.json");
    std::fs::write(
        &cfg_path,
        json!({
            "statsScope": "filtered",
            "maxRecordsPerView": 50,
            "profiles": [
                {
                    "name": "library",
                    "searchFields": ["title", "author"],
                    "filters": [{ "key": "onLoan", "kind": "boolean", "field": "loan.active" }],
                    "summary": { "groups": [{ "key": "genre", "paths": ["genre"] }] }
                },
                { "name": "", "searchFields": ["x"] }
            ]
        })
        .to_string(),
    )
    .expect("write config");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&cfg_path);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["statsScope"], "filtered");
    assert_eq!(health["maxRecordsPerView"], json!(50));
    assert_eq!(health["profileCount"], json!(6));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.query",
        json!({
            "profile": "library",
            "searchTerm": "le guin",
            "filters": { "onLoan": "true" },
            "records": [
                { "title": "The Dispossessed", "author": "Ursula K. Le Guin", "genre": "SF", "loan": { "active": true } },
                { "title": "Earthsea", "author": "Ursula K. Le Guin", "genre": "Fantasy", "loan": { "active": false } },
                { "title": "Dune", "author": "Frank Herbert", "genre": "SF" }
            ]
        }),
    );
    assert_eq!(result["filteredCount"], json!(1));
    assert_eq!(result["statsScope"], "filtered");
    assert_eq!(result["stats"]["total"], json!(1));
    assert_eq!(result["stats"]["groups"]["genre"]["SF"], json!(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let cfg_path = dir.path().join("broken.json");
    std::fs::write(&cfg_path, "{ statsScope: ").expect("write config");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&cfg_path);
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["statsScope"], "all");
    assert_eq!(health["maxRecordsPerView"], json!(10000));
    assert_eq!(health["profileCount"], json!(5));

    drop(stdin);
    let _ = child.wait();
}

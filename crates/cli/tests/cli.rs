use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const ROUTES: &str = r#"const db = require('./db');

module.exports = async function routes(fastify) {
  fastify.get('/users', async (request, reply) => {
    return db.list();
  });

  fastify.post('/users', async (request, reply) => {
    return db.insert(request.body);
  });
};
"#;

const SERVICE: &str = r#"export class Greeter {
  greet(name) {
    return `hello ${name}`;
  }
}

export function shout(text) {
  return text.toUpperCase();
}
"#;

#[allow(deprecated)]
fn semchunk() -> Command {
    let mut cmd = Command::cargo_bin("semchunk").expect("binary");
    cmd.arg("--heuristic-tokens").arg("--quiet");
    cmd
}

fn chunks(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON chunk per line"))
        .collect()
}

#[test]
fn chunks_files_as_json_lines() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("greeter.js");
    fs::write(&path, SERVICE).unwrap();

    let output = semchunk().arg(&path).output().expect("command run");
    assert!(output.status.success());

    let chunks = chunks(&output.stdout);
    assert!(!chunks.is_empty());
    for (idx, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["metadata"]["chunk_index"], idx);
        assert_eq!(chunk["metadata"]["total_chunks"], chunks.len());
        assert!(chunk["metadata"]["source_path"]
            .as_str()
            .unwrap()
            .ends_with("greeter.js"));
    }
    let joined: String = chunks
        .iter()
        .map(|chunk| chunk["content"].as_str().unwrap().to_string())
        .collect();
    assert!(joined.contains("class Greeter"));
    assert!(joined.contains("function shout"));
}

#[test]
fn framework_flag_marks_routes_atomic() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("routes.js");
    fs::write(&path, ROUTES).unwrap();

    let output = semchunk()
        .args(["--framework", "fastify"])
        .arg(&path)
        .output()
        .expect("command run");
    assert!(output.status.success());

    let atomic: Vec<Value> = chunks(&output.stdout)
        .into_iter()
        .filter(|chunk| chunk["metadata"]["is_atomic"] == true)
        .collect();
    assert_eq!(atomic.len(), 2);
    assert_eq!(atomic[0]["metadata"]["semantic_type"], "framework_call");
}

#[test]
fn stdin_json_accepts_loader_field_names() {
    let request = serde_json::json!({
        "pageContent": SERVICE,
        "source": "src/greeter.ts",
        "metadata": {"repo": "demo"}
    });

    let output = semchunk()
        .arg("--stdin-json")
        .write_stdin(format!("{request}\n"))
        .output()
        .expect("command run");
    assert!(output.status.success());

    let chunks = chunks(&output.stdout);
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk["metadata"]["source_path"], "src/greeter.ts");
        assert_eq!(chunk["metadata"]["extra"]["repo"], "demo");
    }
}

#[test]
fn stats_go_to_stderr() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("greeter.js");
    fs::write(&path, SERVICE).unwrap();

    semchunk()
        .arg("--stats")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Chunks: "))
        .stdout(predicate::str::contains("Chunks: ").not());
}

#[test]
fn config_file_is_loaded_and_flags_override_it() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("chunker.toml");
    fs::write(&config, "max_tokens = 40\nmin_tokens = 10\noverlap_tokens = 4\n").unwrap();
    let path = temp.path().join("handlers.js");
    let source: String = (0..6)
        .map(|i| format!("export function handler{i}(input) {{\n  const value = input.items.map((item) => item * {i});\n  return value;\n}}\n\n"))
        .collect();
    fs::write(&path, source).unwrap();

    let output = semchunk()
        .arg("--config")
        .arg(&config)
        .arg(&path)
        .output()
        .expect("command run");
    assert!(output.status.success());
    let small = chunks(&output.stdout);
    assert!(small.len() > 1);

    let output = semchunk()
        .arg("--config")
        .arg(&config)
        .args(["--max-tokens", "2048"])
        .arg(&path)
        .output()
        .expect("command run");
    assert!(output.status.success());
    assert!(chunks(&output.stdout).len() < small.len());
}

#[test]
fn invalid_budget_fails_fast() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("greeter.js");
    fs::write(&path, SERVICE).unwrap();

    semchunk()
        .args(["--max-tokens", "50", "--min-tokens", "100"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn missing_input_is_an_error() {
    semchunk()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No input"));

    semchunk()
        .arg("does/not/exist.js")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn timeout_still_produces_chunks() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("greeter.js");
    fs::write(&path, SERVICE).unwrap();

    let output = semchunk()
        .args(["--timeout-ms", "0", "--max-tokens", "30", "--min-tokens", "5", "--overlap-tokens", "4"])
        .arg(&path)
        .output()
        .expect("command run");
    assert!(output.status.success());
    for chunk in chunks(&output.stdout) {
        assert!(chunk["metadata"]["token_count"].as_u64().unwrap() <= 30);
    }
}

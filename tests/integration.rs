use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const OVERRIDE_VARS: [&str; 7] = [
    "OLLAMA_HOST",
    "OLLAMA_MODEL",
    "OLLAMA_SYSTEM_MESSAGE",
    "OLLAMA_TEMPERATURE",
    "PINECONE_HOST",
    "PINECONE_API_KEY",
    "GITHUB_TOKEN",
];

fn panda_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("panda");
    path
}

fn write_config(root: &Path, ollama_host: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[ollama]
host = "{host}"
model = "llama3:latest"

[chunking]
chunk_size = 1000
chunk_overlap = 100

[issues]
file = "{root}/data/issues.json"
persist_dir = "{root}/db/issues-open"
k = 1
"#,
        host = ollama_host,
        root = root.display()
    );

    let config_path = config_dir.join("panda.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn write_issues(root: &Path) {
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let issues = serde_json::json!([
        {
            "id": 1001,
            "number": 11,
            "title": "Redis connection refused after upgrade",
            "body": "core logs show dial tcp redis:6379: connection refused",
            "state": "open",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "labels": [{ "name": "kind/bug" }],
            "html_url": "https://github.com/goharbor/harbor/issues/11"
        },
        {
            "id": 1002,
            "number": 12,
            "title": "Robot account cannot push",
            "body": "403 when pushing with a robot token",
            "state": "open",
            "created_at": "2024-01-03T00:00:00Z",
            "updated_at": "2024-01-04T00:00:00Z",
            "labels": [],
            "html_url": "https://github.com/goharbor/harbor/issues/12"
        }
    ]);
    fs::write(
        data_dir.join("issues.json"),
        serde_json::to_string_pretty(&issues).unwrap(),
    )
    .unwrap();
}

fn run_panda(root: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = panda_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(root)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args);
    for var in OVERRIDE_VARS {
        cmd.env_remove(var);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run panda binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Ollama embed mock: texts mentioning Redis point along x, the rest along y.
async fn mock_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            let embeddings: Vec<Vec<f32>> = body["input"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| {
                    if t.as_str().unwrap().to_lowercase().contains("redis") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": embeddings }))
        })
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9");
    let (stdout, _, ok) = run_panda(tmp.path(), &config, &["--help"]);
    assert!(ok);
    for cmd in ["chat", "models", "csv", "csv-query", "issues"] {
        assert!(stdout.contains(cmd), "help should mention {}", cmd);
    }
}

#[test]
fn test_ask_without_store() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9");
    let (stdout, stderr, ok) = run_panda(tmp.path(), &config, &["issues", "ask"]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("--- Using Similarity Search ---"));
    assert!(stdout.contains("Vector store issues-open does not exist."));
}

#[test]
fn test_index_missing_issues_file() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9");
    let (stdout, stderr, ok) = run_panda(tmp.path(), &config, &["issues", "index"]);
    assert!(!ok);
    assert!(stdout.contains("Persistent directory does not exist. Initializing vector store..."));
    assert!(stderr.contains("does not exist. Please check the path."));
    assert!(!tmp.path().join("db/issues-open").exists());
}

#[test]
fn test_index_skips_existing_store() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9");
    fs::create_dir_all(tmp.path().join("db/issues-open")).unwrap();
    let (stdout, _, ok) = run_panda(tmp.path(), &config, &["issues", "index"]);
    assert!(ok);
    assert!(stdout.contains("Vector store already exists. No need to initialize."));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 10\nchunk_overlap = 20\n").unwrap();
    let (_, stderr, ok) = run_panda(tmp.path(), &config_path, &["issues", "ask"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_index_fails_cleanly_when_ollama_down() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "http://127.0.0.1:9");
    write_issues(tmp.path());
    let (stdout, _, ok) = run_panda(tmp.path(), &config, &["issues", "index"]);
    assert!(!ok);
    assert!(stdout.contains("Length of issues 2"));
    assert!(stdout.contains("Error generating embedding for"));
    assert!(!tmp.path().join("db/issues-open").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_then_ask_end_to_end() {
    let server = mock_ollama().await;
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config = write_config(&root, &server.uri());
    write_issues(&root);

    let (r, c) = (root.clone(), config.clone());
    let (stdout, stderr, ok) =
        tokio::task::spawn_blocking(move || run_panda(&r, &c, &["issues", "index"]))
            .await
            .unwrap();
    assert!(ok, "index failed: {}", stderr);
    assert!(stdout.contains("Length of issues 2"));
    assert!(stdout.contains("Number of document chunks: 2"));
    assert!(stdout.contains("Sample chunk:\nTitle: Redis connection refused after upgrade"));
    assert!(stdout.contains("--- Finished creating vector store ---"));
    assert!(root.join("db/issues-open/store.sqlite").exists());

    let (r, c) = (root.clone(), config.clone());
    let (stdout, stderr, ok) = tokio::task::spawn_blocking(move || {
        run_panda(&r, &c, &["issues", "ask", "Is Redis down?"])
    })
    .await
    .unwrap();
    assert!(ok, "ask failed: {}", stderr);
    assert!(stdout.contains("--- Querying the Vector Store issues-open ---"));
    assert!(stdout.contains("--- Relevant Documents for issues-open ---"));
    assert!(stdout.contains("issue_id: 1001"));
    assert!(stdout.contains("title: Redis connection refused after upgrade"));
    assert!(!stdout.contains("issue_id: 1002"));
    assert!(!stdout.contains("text: "));

    // Second index run is a no-op.
    let (r, c) = (root.clone(), config.clone());
    let (stdout, _, ok) =
        tokio::task::spawn_blocking(move || run_panda(&r, &c, &["issues", "index"]))
            .await
            .unwrap();
    assert!(ok);
    assert!(stdout.contains("Vector store already exists."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pull_writes_issue_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/goharbor/harbor/issues"))
        .and(wiremock::matchers::query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": 5, "title": "x" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/goharbor/harbor/issues"))
        .and(wiremock::matchers::query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config = write_config(&root, "http://127.0.0.1:9");
    let mut content = fs::read_to_string(&config).unwrap();
    content.push_str(&format!("\n[github]\napi_url = \"{}\"\n", server.uri()));
    fs::write(&config, content).unwrap();

    let (r, c) = (root.clone(), config.clone());
    let (stdout, stderr, ok) =
        tokio::task::spawn_blocking(move || run_panda(&r, &c, &["issues", "pull"]))
            .await
            .unwrap();
    assert!(ok, "pull failed: {}", stderr);
    assert!(stdout.contains("Fetching page 1..."));
    assert!(stdout.contains("Fetching page 2..."));
    assert!(stdout.contains("Total Issue Collected: 1"));
    assert!(stdout.contains("Completed"));

    let written = fs::read_to_string(root.join("data/issues.json")).unwrap();
    assert!(written.starts_with("[\n    {"));
}

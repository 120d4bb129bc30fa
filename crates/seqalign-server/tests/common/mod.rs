//! Common test utilities for SeqAlign server integration tests
//!
//! [`TestApp`] builds the full router over a temporary data directory with the
//! local queue backend. On unix the aligners are replaced by small shell
//! scripts so jobs run end to end without BLAST+ or minimap2 installed:
//!
//! - `blastn` copies `<db>.hits.json` to its `-out` file, or fails when
//!   `<db>.fail` exists
//! - `makeblastdb` writes `<out>.nin`, or fails when the FASTA contains `FAIL`
//! - `minimap2 -d` writes the `.mmi` the same way; a search prints `<db>.paf`
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestApp;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let app = TestApp::start().await;
//!     let (status, body) = app.get("/health").await;
//! }
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use seqalign_server::api::{build_state, create_router};
use seqalign_server::config::{
    Config, CorsConfig, QueueBackend, QueueConfig, ServerConfig, StorageConfig, ToolsConfig,
};

const MULTIPART_BOUNDARY: &str = "seqalign-test-boundary";

const FAKE_BLASTN: &str = r#"#!/bin/sh
out=""
db=""
while [ $# -gt 0 ]; do
  case "$1" in
    -out) out="$2"; shift 2 ;;
    -db) db="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -f "$db.fail" ]; then
  echo "BLAST Database error: No alias or index file found for nucleotide database" >&2
  exit 2
fi
if [ -f "$db.hits.json" ]; then
  cp "$db.hits.json" "$out"
else
  printf '{"BlastOutput2":[]}' > "$out"
fi
"#;

const FAKE_MAKEBLASTDB: &str = r#"#!/bin/sh
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -in) in="$2"; shift 2 ;;
    -out) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q FAIL "$in"; then
  echo "FASTA-Reader: invalid residues" >&2
  exit 1
fi
: > "$out.nin"
"#;

const FAKE_MINIMAP2: &str = r#"#!/bin/sh
if [ "$1" = "-d" ]; then
  if grep -q FAIL "$3"; then
    echo "[ERROR] failed to parse the reference" >&2
    exit 1
  fi
  : > "$2"
  exit 0
fi
shift
if [ "$1" = "-x" ]; then
  shift 2
fi
if [ -f "$1.paf" ]; then
  cat "$1.paf"
fi
"#;

/// A router over a private data directory
pub struct TestApp {
    pub dir: TempDir,
    pub config: Config,
    pub router: Router,
}

impl TestApp {
    /// Application with the fake aligners installed
    pub async fn start() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        install_script(&bin_dir.join("blastn"), FAKE_BLASTN);
        install_script(&bin_dir.join("makeblastdb"), FAKE_MAKEBLASTDB);
        install_script(&bin_dir.join("minimap2"), FAKE_MINIMAP2);

        let config = test_config(dir.path(), &bin_dir);
        let (state, _workers) = build_state(&config).await.expect("Failed to build state");
        let router = create_router(state, &config.cors, config.server.max_upload_bytes);

        Self {
            dir,
            config,
            router,
        }
    }

    pub fn reference_dir(&self) -> &Path {
        &self.config.storage.reference_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.storage.upload_dir
    }

    /// Put a reference FASTA straight into the reference directory
    pub fn add_reference(&self, name: &str, content: &str) -> PathBuf {
        let path = self.reference_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Put a file next to a reference, e.g. canned search output
    pub fn add_reference_sidecar(&self, reference: &str, suffix: &str, content: &str) {
        let path = self.reference_dir().join(format!("{reference}.{suffix}"));
        std::fs::write(path, content).unwrap();
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("POST", uri, body).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json("PUT", uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .method("DELETE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Multipart upload with a single `file` field
    pub async fn upload(&self, uri: &str, filename: &str, content: &[u8]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Poll a job until it reaches SUCCESS or FAILURE
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        let uri = format!("/api/jobs/{job_id}");
        for _ in 0..250 {
            let (status, body) = self.get(&uri).await;
            assert_eq!(status, StatusCode::OK);
            if body["state"] == "SUCCESS" || body["state"] == "FAILURE" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Job {job_id} did not finish");
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .method(method)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, json)
    }
}

fn test_config(root: &Path, bin_dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            shutdown_timeout_secs: 1,
            max_upload_bytes: 1024 * 1024,
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        },
        storage: StorageConfig {
            reference_dir: root.join("references"),
            upload_dir: root.join("uploads"),
            jobs_dir: root.join("jobs"),
            metadata_path: root.join("databases.yaml"),
        },
        tools: ToolsConfig {
            blast_bin_dir: Some(bin_dir.to_path_buf()),
            minimap2_path: bin_dir.join("minimap2"),
        },
        queue: QueueConfig {
            backend: QueueBackend::Local,
            workers: 2,
            database_url: None,
            max_connections: 1,
        },
    }
}

#[cfg(unix)]
fn install_script(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn install_script(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

/// BLAST JSON (outfmt 15) with one single-HSP hit per `(accession, bit_score)`
pub fn blast_report(query: &str, hits: &[(&str, f64)]) -> String {
    let hits: Vec<Value> = hits
        .iter()
        .enumerate()
        .map(|(i, (accession, bit_score))| {
            serde_json::json!({
                "num": i + 1,
                "description": [{"accession": accession, "title": format!("{accession} chromosome")}],
                "len": 5000,
                "hsps": [{
                    "num": 1,
                    "bit_score": bit_score,
                    "evalue": 1e-20,
                    "identity": 95,
                    "align_len": 100,
                    "gaps": 1,
                    "query_from": 1,
                    "query_to": 100,
                    "hit_from": 1001,
                    "hit_to": 1100
                }]
            })
        })
        .collect();

    serde_json::json!({
        "BlastOutput2": [{
            "report": {
                "program": "blastn",
                "results": {
                    "search": {
                        "query_id": "Query_1",
                        "query_title": query,
                        "query_len": 100,
                        "hits": hits
                    }
                }
            }
        }]
    })
    .to_string()
}

/// One PAF line (twelve mandatory columns plus a tag)
pub fn paf_line(query: &str, target: &str, mapq: u32) -> String {
    format!("{query}\t1000\t10\t990\t+\t{target}\t50000\t2000\t2980\t950\t980\t{mapq}\ttp:A:P\n")
}

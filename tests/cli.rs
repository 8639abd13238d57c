//! End-to-end tests for the `folio` binary.
//!
//! Every test gets its own database and settings file under a temp dir.
//! Stdout is not a terminal here, so commands answer in JSON.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const PNG: &str = "data:image/png;base64,aGVsbG8=";
const PNG_HASH: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("data").join("folio.db")
    }

    fn folio(&self) -> Command {
        let mut cmd = Command::cargo_bin("folio").unwrap();
        cmd.env_remove("FOLIO_DB")
            .env_remove("FOLIO_MERGE_STRATEGY")
            .env_remove("FOLIO_TEST_DB")
            .env("FOLIO_CONFIG", self.dir.path().join("config.json"))
            .env("FOLIO_SESSION", "tester")
            .arg("--db")
            .arg(self.db());
        cmd
    }

    fn init(&self) {
        self.folio().arg("init").assert().success();
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.folio().args(args).arg("--json").output().unwrap();
        assert!(
            output.status.success(),
            "folio {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn add(&self, note: &str, body: &str) -> String {
        let report = self.json(&["add", "--note", note, body]);
        report["id"].as_str().unwrap().to_string()
    }
}

fn dir_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_init_creates_database() {
    let env = Env::new();
    let out = env.json(&["init"]);
    assert!(env.db().exists());
    assert!(out["database"].as_str().unwrap().ends_with("folio.db"));

    env.folio().arg("init").assert().code(2);
    env.folio().args(["init", "--force"]).assert().success();
}

#[test]
fn test_commands_require_init() {
    let env = Env::new();
    let output = env.folio().args(["get", "--note", "n1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8(output.stderr).unwrap();
    let err: Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn test_add_extracts_inline_image() {
    let env = Env::new();
    env.init();
    let id = env.add("n1", &format!(r#"<p>pic</p><img src="{PNG}">"#));

    let item = env.json(&["get", &id]);
    let body = item["data"].as_str().unwrap();
    assert!(body.contains(&format!(r#"data-hash="{PNG_HASH}""#)));
    assert!(!body.contains("base64"));
    assert_eq!(item["noteId"], "n1");
    assert_eq!(item["locked"], false);

    let attachments = env.json(&["attachments", "list", "--note", "n1"]);
    let attachments = attachments.as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["hash"], PNG_HASH);
    assert_eq!(attachments[0]["mime_type"], "image/png");
    assert_eq!(attachments[0]["notes"], serde_json::json!(["n1"]));
}

#[test]
fn test_attachment_list_shows_owning_notes() {
    let env = Env::new();
    env.init();
    env.add("n1", &format!(r#"<img src="{PNG}">"#));
    let second = env.add("n2", &format!(r#"<p>same</p><img src="{PNG}">"#));

    let all = env.json(&["attachments", "list"]);
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["notes"], serde_json::json!(["n1", "n2"]));

    env.json(&["attachments", "remove", &second, PNG_HASH]);
    let all = env.json(&["attachments", "list"]);
    assert_eq!(all[0]["notes"], serde_json::json!(["n1"]));
}

#[test]
fn test_get_inlines_media() {
    let env = Env::new();
    env.init();
    env.add("n1", &format!(r#"<img src="{PNG}">"#));

    let item = env.json(&["get", "--note", "n1", "--media", "inline"]);
    assert!(item["data"].as_str().unwrap().contains(PNG));

    let item = env.json(&["get", "--note", "n1", "--media", "placeholder"]);
    let body = item["data"].as_str().unwrap();
    assert!(body.contains("/images/media-placeholder.svg"));
    assert!(!body.contains("base64"));
}

#[test]
fn test_update_keeps_single_record_per_note() {
    let env = Env::new();
    env.init();
    let first = env.add("n1", "<p>one</p>");
    let second = env.add("n1", "<p>two</p>");
    assert_eq!(first, second);

    let item = env.json(&["get", "--note", "n1"]);
    assert_eq!(item["data"], "<p>two</p>");
}

#[test]
fn test_add_without_note_is_rejected() {
    let env = Env::new();
    env.init();
    let output = env.folio().args(["add", "<p>orphan</p>"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_remove_hides_content() {
    let env = Env::new();
    env.init();
    let id = env.add("n1", "<p>bye</p>");

    let out = env.json(&["remove", &id]);
    assert_eq!(out["removed"], 1);

    env.folio().args(["get", &id]).assert().code(3);
}

#[test]
fn test_get_or_empty_for_note_without_content() {
    let env = Env::new();
    env.init();
    env.folio().args(["get", "--note", "fresh"]).assert().code(3);

    let item = env.json(&["get", "--note", "fresh", "--or-empty"]);
    assert_eq!(item["noteId"], "fresh");
    assert_eq!(item["data"], "<p></p>");
    assert_eq!(item["localOnly"], true);
    assert_eq!(item["locked"], false);

    // Nothing was written.
    env.folio().args(["get", "--note", "fresh"]).assert().code(3);
}

#[test]
fn test_remove_attachment_reference() {
    let env = Env::new();
    env.init();
    let id = env.add("n1", &format!(r#"<p>x</p><img src="{PNG}">"#));

    env.json(&["attachments", "remove", &id, PNG_HASH]);

    let item = env.json(&["get", &id]);
    assert!(!item["data"].as_str().unwrap().contains(PNG_HASH));
    let linked = env.json(&["attachments", "list", "--note", "n1"]);
    assert!(linked.as_array().unwrap().is_empty());
}

#[test]
fn test_sync_round_trip() {
    let source = Env::new();
    source.init();
    source.add("n1", "<p>shared</p>");
    let dir = source.dir.path().join("export");

    let exported = source.json(&["sync", "export", "--dir", &dir_arg(&dir)]);
    assert_eq!(exported["stats"]["content"], 1);
    assert!(dir.join("content.jsonl").exists());
    assert!(dir.join(".gitignore").exists());

    let status = source.json(&["sync", "status", "--dir", &dir_arg(&dir)]);
    assert_eq!(status["unsynced"], 0);
    assert_eq!(status["has_export_files"], true);

    let target = Env::new();
    target.init();
    let imported = target.json(&["sync", "import", "--dir", &dir_arg(&dir)]);
    assert_eq!(imported["stats"]["content"]["created"], 1);

    let item = target.json(&["get", "--note", "n1"]);
    assert_eq!(item["data"], "<p>shared</p>");
}

#[test]
fn test_sync_export_skips_local_only() {
    let env = Env::new();
    env.init();
    env.json(&["add", "--note", "n1", "--local-only", "<p>mine</p>"]);
    let dir = env.dir.path().join("export");

    let out = env.json(&["sync", "export", "--dir", &dir_arg(&dir)]);
    assert_eq!(out["error"], "nothing_to_export");
    assert!(!dir.join("content.jsonl").exists());
}

#[test]
fn test_version() {
    let env = Env::new();
    let out = env.json(&["version"]);
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
}

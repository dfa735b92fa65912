use predicates::prelude::*;
use serde_json::Value;

use super::common::TestEnv;

#[test]
fn info_shows_rendered_pack_names() {
  let env = TestEnv::with_config(r#"{ "name": "My Project", "author": "Alex", "pipeline": ["demo"] }"#);

  env
    .beet_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("My Project v0.0.0 by Alex"))
    .stdout(predicate::str::contains("my_project_resources"))
    .stdout(predicate::str::contains("beet.prelude → demo"));
}

#[test]
fn info_json_includes_pack_options() {
  let env = TestEnv::with_config(
    r#"{ "name": "My Project", "prelude": false, "meta": { "data_pack_format": 10, "data_pack_zipped": true } }"#,
  );

  let output = env.beet_cmd().args(["info", "--format", "json"]).output().unwrap();
  assert!(output.status.success());

  let info: Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(info["pipeline"], serde_json::json!([]));
  assert_eq!(info["data_pack"]["name"], "my_project");
  assert_eq!(info["data_pack"]["format"], 10);
  assert_eq!(info["data_pack"]["zipped"], true);
  assert_eq!(info["resource_pack"]["format"], 6);
  assert_eq!(
    info["resource_pack"]["description"],
    "Generated by beet\n\nVersion 0.0.0\nBy Unknown"
  );
}

#[test]
fn info_does_not_run_plugins() {
  let env = TestEnv::with_config(r#"{ "pipeline": ["never"] }"#);
  env.write_file("never.lua", "error('should not load')");

  env.beet_cmd().arg("info").assert().success();
  assert!(!env.project_path().join("generated").exists());
}

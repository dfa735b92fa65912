use predicates::prelude::*;
use serde_json::Value;

use super::common::TestEnv;

const GENERATOR: &str = r#"
return function(ctx)
  ctx:generate("function", "say hello")
  ctx:generate("model", { parent = "item/generated" })
  ctx:push("plugins.late")
end
"#;

#[test]
fn build_prints_summary() {
  let env = TestEnv::with_config(r#"{ "name": "Hello Pack", "pipeline": ["plugins.generator"] }"#);
  env.write_file("plugins/generator.lua", GENERATOR);
  env.write_file("plugins/late.lua", "return function(ctx) end");

  env
    .beet_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built Hello Pack"))
    .stdout(predicate::str::contains("hello_pack_resources (1 items)"))
    .stdout(predicate::str::contains("hello_pack (1 items)"));
}

#[test]
fn build_json_output() {
  let env = TestEnv::with_config(r#"{ "name": "Hello Pack", "pipeline": ["plugins.generator"] }"#);
  env.write_file("plugins/generator.lua", GENERATOR);
  env.write_file("plugins/late.lua", "return function(ctx) end");

  let output = env.beet_cmd().args(["build", "--format", "json"]).output().unwrap();
  assert!(output.status.success());

  let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["project"], "Hello Pack");
  // prelude, generator, late
  assert_eq!(summary["applied_plugins"], 3);
  assert_eq!(summary["packs"][0]["name"], "hello_pack_resources");
  assert_eq!(summary["packs"][1]["items"], 1);
  assert!(env.project_path().join("generated").is_dir());
}

#[test]
fn build_with_explicit_config_and_project() {
  let env = TestEnv::empty();
  env.write_file("config/beet.yml", "name: Yaml\nprelude: false\n");

  env
    .beet_cmd()
    .current_dir(std::env::temp_dir())
    .arg("build")
    .arg("--config")
    .arg(env.temp.path().join("config/beet.yml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Built Yaml"));
}

#[test]
fn failing_plugin_reports_error_chain() {
  let env = TestEnv::with_config(r#"{ "pipeline": ["broken"] }"#);
  env.write_file("broken.lua", r#"return function(ctx) error("texture atlas overflow") end"#);

  env
    .beet_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("plugin `broken` failed"))
    .stderr(predicate::str::contains("texture atlas overflow"));
}

#[test]
fn abort_message_is_reported() {
  let env = TestEnv::with_config(r#"{ "pipeline": ["stop"] }"#);
  env.write_file("stop.lua", r#"return function(ctx) ctx:abort("missing pack.mcmeta") end"#);

  env
    .beet_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("missing pack.mcmeta"));
}

#[test]
fn verbose_logs_plugin_application() {
  let env = TestEnv::with_config(r#"{ "pipeline": [] }"#);

  env
    .beet_cmd()
    .args(["--verbose", "build"])
    .assert()
    .success()
    .stderr(predicate::str::contains("applying plugin"));
}

//! `pkgmatrix render` integration tests.

use predicates::prelude::*;

use super::common::{fixture_path, pkgmatrix_cmd, stdout_json};

#[test]
fn prints_each_configuration() {
  pkgmatrix_cmd("render")
    .arg(fixture_path("recipes"))
    .assert()
    .success()
    .stdout(predicate::str::contains("zlib-1.3.1-0"))
    .stdout(predicate::str::contains("gcc_linux-64"))
    .stdout(predicate::str::contains("python=3.11"))
    .stdout(predicate::str::contains("Rendered 3 configuration(s) in 2 wave(s)"));
}

#[test]
fn local_run_exports_reach_consumers() {
  let output = pkgmatrix_cmd("render")
    .arg(fixture_path("recipes"))
    .arg("--select")
    .arg("python=3.12")
    .arg("--json")
    .assert()
    .success()
    .get_output()
    .clone();

  let json = stdout_json(&output);
  let configs = json["configurations"].as_array().unwrap();
  assert_eq!(configs.len(), 2);
  let pyext = &configs[1];
  assert_eq!(pyext["name"], "pyext");
  assert_eq!(pyext["build_string"], "py312_0");
  let run: Vec<&str> = pyext["requirements"]["run"]
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["name"].as_str().unwrap())
    .collect();
  assert!(run.contains(&"zlib"), "run was {:?}", run);
  assert_eq!(json["waves"], serde_json::json!([[0], [1]]));
}

#[test]
fn index_supplies_run_exports() {
  let output = pkgmatrix_cmd("render")
    .arg(fixture_path("split"))
    .arg("--index")
    .arg(fixture_path("index.yaml"))
    .arg("--json")
    .assert()
    .success()
    .get_output()
    .clone();

  let json = stdout_json(&output);
  let libfoo = &json["configurations"][0];
  assert_eq!(libfoo["name"], "libfoo");
  let run = libfoo["requirements"]["run"].as_array().unwrap();
  assert_eq!(run.len(), 1);
  assert_eq!(run[0]["name"], "openssl");
  assert_eq!(run[0]["version"], ">=3.2.0,<4.0a0");
}

#[test]
fn missing_index_is_fatal() {
  pkgmatrix_cmd("render")
    .arg(fixture_path("split"))
    .arg("--index")
    .arg("/nonexistent/index.yaml")
    .assert()
    .failure()
    .stderr(predicate::str::contains("index.yaml"));
}

#[test]
fn missing_recipe_is_fatal() {
  pkgmatrix_cmd("render")
    .arg("/nonexistent/recipe/dir")
    .assert()
    .failure()
    .stderr(predicate::str::contains("recipe.lua"));
}

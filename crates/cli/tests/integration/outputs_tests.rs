//! `pkgmatrix outputs` integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path, pkgmatrix_cmd, stdout_json};

#[test]
fn lists_filenames_in_dependency_order() {
  let output = pkgmatrix_cmd("outputs")
    .arg(fixture_path("recipes"))
    .assert()
    .success()
    .get_output()
    .clone();

  let stdout = String::from_utf8(output.stdout).unwrap();
  let lines: Vec<&str> = stdout.lines().collect();
  assert_eq!(lines, vec!["zlib-1.3.1-0", "pyext-2.0-py311_0", "pyext-2.0-py312_0"]);
}

#[test]
fn select_restricts_the_matrix() {
  pkgmatrix_cmd("outputs")
    .arg(fixture_path("recipes"))
    .arg("--select")
    .arg("python=3.12")
    .assert()
    .success()
    .stdout(predicate::str::contains("pyext-2.0-py312_0"))
    .stdout(predicate::str::contains("py311").not());
}

#[test]
fn variant_override_replaces_candidates() {
  pkgmatrix_cmd("outputs")
    .arg(fixture_path("recipes/pyext"))
    .arg("--variant")
    .arg("python=3.10,3.13")
    .assert()
    .success()
    .stdout(predicate::str::contains("pyext-2.0-py310_0"))
    .stdout(predicate::str::contains("pyext-2.0-py313_0"));
}

#[test]
fn variant_config_file_is_layered_over_recipe() {
  let env = TestEnv::empty();
  let file = env.write_file("ci.yaml", "python:\n  - '3.9'\n");

  pkgmatrix_cmd("outputs")
    .arg(fixture_path("recipes/pyext"))
    .arg("-m")
    .arg(&file)
    .assert()
    .success()
    .stdout("pyext-2.0-py39_0\n");
}

#[test]
fn split_recipe_gets_metapackage_last() {
  let output = pkgmatrix_cmd("outputs")
    .arg(fixture_path("split"))
    .assert()
    .success()
    .get_output()
    .clone();

  let stdout = String::from_utf8(output.stdout).unwrap();
  let lines: Vec<&str> = stdout.lines().collect();
  assert_eq!(lines.len(), 3);
  assert!(lines[0].starts_with("libfoo-1.0-h"), "got {:?}", lines);
  assert!(lines[1].starts_with("foo-tools-1.0-"), "got {:?}", lines);
  assert!(lines[2].starts_with("foo-1.0-"), "got {:?}", lines);
}

#[test]
fn render_failure_exits_nonzero_with_assignment() {
  let env = TestEnv::empty();
  env.write_file("broken/variants.yaml", "python:\n  - '3.12'\n");
  env.write_file(
    "broken/recipe.lua",
    "return { package = { name = 'broken', version = '0.1' }, requirements = { host = { 'python ' .. variant.python, 'cuda ' .. variant.cuda } } }",
  );

  pkgmatrix_cmd("outputs")
    .arg(env.temp.path().join("broken"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("broken"))
    .stderr(predicate::str::contains("python=3.12"))
    .stderr(predicate::str::contains("cuda"));
}

#[test]
fn json_failures_are_structured() {
  let output = pkgmatrix_cmd("outputs")
    .arg(fixture_path("broken"))
    .arg("--json")
    .assert()
    .failure()
    .get_output()
    .clone();

  let json = stdout_json(&output);
  assert_eq!(json["outputs"].as_array().unwrap().len(), 0);
  let failures = json["failures"].as_array().unwrap();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0]["recipe"], "broken");
  assert_eq!(failures[0]["kind"], "render");
}

#[test]
fn recipe_cycle_is_reported() {
  let env = TestEnv::empty();
  env.write_file(
    "a/recipe.lua",
    "return { package = { name = 'a', version = '1' }, requirements = { host = { 'b' } } }",
  );
  env.write_file(
    "b/recipe.lua",
    "return { package = { name = 'b', version = '1' }, requirements = { host = { 'a' } } }",
  );

  pkgmatrix_cmd("outputs")
    .arg(env.temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle: a -> b -> a"));
}

//! `pkgmatrix variants` integration tests.

use predicates::prelude::*;

use super::common::{fixture_path, pkgmatrix_cmd, stdout_json};

#[test]
fn shows_matrix_and_loop_vars() {
  pkgmatrix_cmd("variants")
    .arg(fixture_path("recipes/pyext"))
    .assert()
    .success()
    .stdout(predicate::str::contains("pyext"))
    .stdout(predicate::str::contains("Variants: 2"))
    .stdout(predicate::str::contains("Loop vars: python"))
    .stdout(predicate::str::contains("python=3.12"));
}

#[test]
fn json_lists_used_assignments() {
  let output = pkgmatrix_cmd("variants")
    .arg(fixture_path("recipes/pyext"))
    .arg("--json")
    .assert()
    .success()
    .get_output()
    .clone();

  let json = stdout_json(&output);
  let recipe = &json["recipes"][0];
  assert_eq!(recipe["recipe"], "pyext");
  assert_eq!(recipe["raw_points"], 2);
  assert_eq!(recipe["variants"][0]["assignment"]["python"], "3.11");
  assert_eq!(recipe["variants"][1]["assignment"]["python"], "3.12");
}

#[test]
fn invalid_select_is_rejected() {
  pkgmatrix_cmd("variants")
    .arg(fixture_path("recipes/pyext"))
    .arg("--select")
    .arg("python")
    .assert()
    .failure()
    .stderr(predicate::str::contains("--select"));
}

//! Implementation of the `pkgmatrix outputs` command.
//!
//! Prints the artifact filename of every finalized configuration, one per
//! line, in dependency order.

use anyhow::{Context, Result};
use serde_json::json;

use pkgmatrix_lib::eval::evaluate_recipes;

use super::{RecipeArgs, report_failures};
use crate::output::print_json;

pub fn cmd_outputs(args: &RecipeArgs) -> Result<bool> {
  let options = args.options()?;
  let manifest = evaluate_recipes(&args.recipes, &options).context("Failed to evaluate recipes")?;

  if args.format().is_json() {
    print_json(&json!({ "outputs": manifest.filenames(), "failures": manifest.failures }))?;
    return Ok(manifest.is_success());
  }

  for filename in manifest.filenames() {
    println!("{}", filename);
  }
  Ok(report_failures(&manifest.failures))
}

//! Implementation of the `pkgmatrix variants` command.
//!
//! Prints the expanded variant matrix of each recipe before finalization:
//! how many points the cross product had, how many were skipped, and the
//! used assignment of every surviving variant.

use anyhow::{Context, Result};
use serde_json::json;

use pkgmatrix_lib::eval::expand_recipes;

use super::{RecipeArgs, report_failures};
use crate::output::{print_info, print_json, print_stat, print_warning};

pub fn cmd_variants(args: &RecipeArgs) -> Result<bool> {
  let options = args.options()?;
  let expansions = expand_recipes(&args.recipes, &options).context("Failed to expand recipes")?;
  let clean = expansions.iter().all(|e| e.result.failures.is_empty());

  if args.format().is_json() {
    let recipes: Vec<_> = expansions
      .iter()
      .map(|e| {
        let variants: Vec<_> = e
          .result
          .variants
          .iter()
          .map(|v| json!({ "index": v.index, "assignment": v.used_assignment(), "used": v.used }))
          .collect();
        json!({
          "recipe": e.name,
          "raw_points": e.result.raw_points,
          "skipped": e.result.skipped,
          "loop_vars": e.result.loop_vars(),
          "variants": variants,
        })
      })
      .collect();
    let failures: Vec<_> = expansions.iter().flat_map(|e| e.result.failures.iter()).collect();
    print_json(&json!({ "recipes": recipes, "failures": failures }))?;
    return Ok(clean);
  }

  for expansion in &expansions {
    let result = &expansion.result;
    print_info(&expansion.name);
    print_stat("Parameters", &expansion.space.len().to_string());
    print_stat("Points", &result.raw_points.to_string());
    print_stat("Variants", &result.variants.len().to_string());
    let loop_vars = result.loop_vars();
    if !loop_vars.is_empty() {
      print_stat("Loop vars", &loop_vars.join(", "));
    }
    for variant in &result.variants {
      println!("    {}: {}", variant.index, variant.used_assignment());
    }
    if result.skipped > 0 {
      print_warning(&format!("{}: skipped {} point(s)", expansion.name, result.skipped));
    }
    println!();
  }

  let failures: Vec<_> = expansions.iter().flat_map(|e| e.result.failures.iter().cloned()).collect();
  Ok(report_failures(&failures))
}

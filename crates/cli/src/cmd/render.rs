//! Implementation of the `pkgmatrix render` command.
//!
//! Evaluates recipes and prints each finalized configuration with its build
//! string, hash, used variant and requirement lists. Nothing is built.

use anyhow::{Context, Result};

use pkgmatrix_lib::build::Configuration;
use pkgmatrix_lib::eval::evaluate_recipes;

use super::{RecipeArgs, report_failures};
use crate::output::{format_hash, format_specs, print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_render(args: &RecipeArgs, verbose: bool) -> Result<bool> {
  let options = args.options()?;
  let manifest = evaluate_recipes(&args.recipes, &options).context("Failed to evaluate recipes")?;

  if args.format().is_json() {
    print_json(&manifest)?;
    return Ok(manifest.is_success());
  }

  for config in &manifest.configurations {
    print_configuration(config, verbose);
    println!();
  }

  print_success(&format!(
    "Rendered {} configuration(s) in {} wave(s)",
    manifest.configurations.len(),
    manifest.waves.len()
  ));
  Ok(report_failures(&manifest.failures))
}

fn print_configuration(config: &Configuration, verbose: bool) {
  print_info(&config.filename());
  print_stat("Recipe", &config.recipe);
  print_stat("Build string", &config.build_string);
  print_stat("Hash", &format_hash(config.hash.as_ref()));
  print_stat("Variant", &config.used.to_string());
  print_stat("Build", &format_specs(&config.requirements.build));
  print_stat("Host", &format_specs(&config.requirements.host));
  print_stat("Run", &format_specs(&config.requirements.run));
  if config.metapackage {
    print_stat("Metapackage", "yes");
  }
  if verbose {
    print_stat("Full variant", &config.variant.to_string());
    for dep in &config.depends_on {
      println!("    {} {}", symbols::ARROW, dep);
    }
  }
}

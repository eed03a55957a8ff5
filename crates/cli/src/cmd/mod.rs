mod outputs;
mod render;
mod variants;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use pkgmatrix_lib::eval::EvalOptions;
use pkgmatrix_lib::manifest::ConfigurationFailure;
use pkgmatrix_lib::variant::parse_override;

use crate::output::{OutputFormat, print_error};

pub use outputs::cmd_outputs;
pub use render::cmd_render;
pub use variants::cmd_variants;

/// Options shared by every subcommand that reads recipes.
#[derive(Debug, Args)]
pub struct RecipeArgs {
  /// Recipe files, recipe directories, or trees containing recipes
  #[arg(required = true)]
  pub recipes: Vec<PathBuf>,

  /// Additional variant config file, applied after the recipe's own
  #[arg(short = 'm', long = "variant-config", value_name = "FILE")]
  pub variant_config: Vec<PathBuf>,

  /// Override a parameter's candidate values
  #[arg(long = "variant", value_name = "KEY=VALUES")]
  pub variants: Vec<String>,

  /// Keep only the given values of a parameter
  #[arg(long = "select", value_name = "KEY=VALUES")]
  pub selections: Vec<String>,

  /// Index of previously built packages (YAML or JSON)
  #[arg(long, value_name = "FILE")]
  pub index: Option<PathBuf>,

  /// Platform subdir to render for, e.g. linux-64
  #[arg(long, value_name = "SUBDIR")]
  pub target_platform: Option<String>,

  /// Output as JSON
  #[arg(long)]
  pub json: bool,
}

impl RecipeArgs {
  pub fn format(&self) -> OutputFormat {
    if self.json { OutputFormat::Json } else { OutputFormat::Text }
  }

  pub fn options(&self) -> Result<EvalOptions> {
    let parse = |flag: &str, raw: &[String]| -> Result<Vec<_>> {
      raw
        .iter()
        .map(|r| parse_override(r).with_context(|| format!("Invalid {} argument: {}", flag, r)))
        .collect()
    };

    let options = EvalOptions {
      variant_files: self.variant_config.clone(),
      overrides: parse("--variant", &self.variants)?,
      selections: parse("--select", &self.selections)?,
      target_platform: self.target_platform.clone(),
      index: self.index.clone(),
    };
    debug!(?options, "resolved recipe options");
    Ok(options)
  }
}

/// Print collected failures to stderr. Returns whether the run was clean.
pub fn report_failures(failures: &[ConfigurationFailure]) -> bool {
  for failure in failures {
    print_error(&failure.to_string());
  }
  failures.is_empty()
}

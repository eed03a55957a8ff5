mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use cmd::RecipeArgs;
use output::{print_error, print_json};

/// pkgmatrix - expand recipe variant matrices into ordered build configurations
#[derive(Parser)]
#[command(name = "pkgmatrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print every finalized configuration without building
  Render {
    #[command(flatten)]
    args: RecipeArgs,
  },
  /// Print artifact filenames in dependency order
  Outputs {
    #[command(flatten)]
    args: RecipeArgs,
  },
  /// Print the expanded variant matrix of each recipe
  Variants {
    #[command(flatten)]
    args: RecipeArgs,
  },
}

impl Commands {
  fn args(&self) -> &RecipeArgs {
    match self {
      Commands::Render { args } | Commands::Outputs { args } | Commands::Variants { args } => args,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match &cli.command {
    Commands::Render { args } => cmd::cmd_render(args, cli.verbose),
    Commands::Outputs { args } => cmd::cmd_outputs(args),
    Commands::Variants { args } => cmd::cmd_variants(args),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      if cli.command.args().json {
        let report = json!({ "error": format!("{:#}", err), "failures": [] });
        if let Err(print_err) = print_json(&report) {
          print_error(&format!("{:#}", print_err));
        }
      } else {
        print_error(&format!("{:#}", err));
      }
      ExitCode::FAILURE
    }
  }
}

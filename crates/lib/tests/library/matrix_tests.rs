//! Matrix expansion through the full pipeline.

use pkgmatrix_lib::eval::build_plan;
use pkgmatrix_lib::finalize::EmptyResolver;

use super::common::{plan, recipe};

const PY_NUMPY: &str = r#"
  return {
    package = { name = 'pandas', version = '2.2.0' },
    requirements = {
      host = { 'python', 'numpy' },
      run = { 'python', 'numpy' },
    },
  }
"#;

#[test]
fn zipped_parameters_move_in_lockstep() {
  let manifest = plan(&[recipe(
    "pandas",
    "python: ['3.11', '3.12']\nnumpy: ['1.26', '2.0']\nzip_keys: [[python, numpy]]\n",
    PY_NUMPY,
  )]);
  assert_eq!(
    manifest.filenames(),
    vec!["pandas-2.2.0-np126py311_0", "pandas-2.2.0-np20py312_0"]
  );
}

#[test]
fn unzipped_parameters_cross() {
  let manifest = plan(&[recipe(
    "pandas",
    "python: ['3.11', '3.12']\nnumpy: ['1.26', '2.0']\n",
    PY_NUMPY,
  )]);
  assert_eq!(manifest.configurations.len(), 4);
}

#[test]
fn unused_parameters_do_not_multiply() {
  let manifest = plan(&[recipe(
    "pandas",
    "python: ['3.11']\nnumpy: ['1.26']\ncuda: ['11', '12']\nopenssl: ['3', '1.1']\n",
    PY_NUMPY,
  )]);
  assert_eq!(manifest.configurations.len(), 1);
  assert!(!manifest.configurations[0].used.contains_key("cuda"));
}

#[test]
fn skipped_points_are_not_failures() {
  let manifest = plan(&[recipe(
    "modern",
    "python: ['3.8', '3.12']\n",
    r#"
      return {
        package = { name = 'modern', version = '1.0' },
        build = { skip = variant.python == '3.8' },
        requirements = { host = { 'python' } },
      }
    "#,
  )]);
  assert_eq!(manifest.filenames(), vec!["modern-1.0-py312_0"]);
  assert!(manifest.is_success());
}

#[test]
fn optional_parameter_prunes_silently() {
  let source = r#"
    optional('cuda')
    return {
      package = { name = 'gpu', version = '1.0' },
      requirements = { host = { 'cudatoolkit ' .. variant.cuda } },
    }
  "#;
  let manifest = plan(&[recipe("gpu", "python: ['3.12']\n", source)]);
  assert!(manifest.configurations.is_empty());
  assert!(manifest.is_success());

  let manifest = plan(&[recipe("gpu", "cuda: ['12.4']\n", source)]);
  assert_eq!(manifest.configurations.len(), 1);
}

#[test]
fn hash_separates_non_legacy_parameters() {
  let manifest = plan(&[recipe(
    "curl",
    "openssl: ['3', '1.1']\n",
    r#"
      return {
        package = { name = 'curl', version = '8.5.0' },
        requirements = { host = { 'openssl' } },
      }
    "#,
  )]);
  let builds: Vec<&str> = manifest.configurations.iter().map(|c| c.build_string.as_str()).collect();
  assert_eq!(builds.len(), 2);
  assert_ne!(builds[0], builds[1]);
  for build in builds {
    assert!(build.starts_with('h') && build.ends_with("_0"), "got {}", build);
    assert_eq!(build.len(), "h".len() + 7 + "_0".len());
  }
}

#[test]
fn force_ignored_parameter_collapses_configurations() {
  let manifest = plan(&[recipe(
    "curl",
    "openssl: ['3', '1.1']\nforce_ignore_keys: [openssl]\n",
    r#"
      return {
        package = { name = 'curl', version = '8.5.0' },
        requirements = { host = { 'openssl' } },
      }
    "#,
  )]);
  assert_eq!(manifest.filenames(), vec!["curl-8.5.0-0"]);
}

#[test]
fn declaration_order_does_not_change_filenames() {
  let source = r#"
    return {
      package = { name = 'tool', version = '1.0' },
      requirements = { host = { 'openssl', 'zlib' } },
    }
  "#;
  let a = plan(&[recipe("tool", "openssl: ['3']\nzlib: ['1.3']\n", source)]);
  let b = plan(&[recipe("tool", "zlib: ['1.3']\nopenssl: ['3']\n", source)]);
  assert_eq!(a.filenames(), b.filenames());
}

#[test]
fn explicit_build_string_wins() {
  let manifest = plan(&[recipe(
    "pinned",
    "openssl: ['3']\n",
    r#"
      return {
        package = { name = 'pinned', version = '1.0' },
        build = { number = 3, string = 'custom_3' },
        requirements = { host = { 'openssl' } },
      }
    "#,
  )]);
  assert_eq!(manifest.filenames(), vec!["pinned-1.0-custom_3"]);
}

#[test]
fn render_errors_are_collected_per_point() {
  let recipes = [recipe(
    "half",
    "python: ['3.11', '3.12']\n",
    r#"
      if variant.python == '3.11' then
        error('unsupported interpreter')
      end
      return { package = { name = 'half', version = '1.0' } }
    "#,
  )];
  let manifest = build_plan(&recipes, &EmptyResolver).unwrap();
  assert_eq!(manifest.configurations.len(), 1);
  assert_eq!(manifest.failures.len(), 1);
  let failure = manifest.failures[0].to_string();
  assert!(failure.contains("python=3.11"), "got {}", failure);
  assert!(failure.contains("unsupported interpreter"), "got {}", failure);
}

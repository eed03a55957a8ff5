//! Pins, run-exports and cross-recipe ordering through the full pipeline.

use pkgmatrix_lib::eval::{EvalError, build_plan};
use pkgmatrix_lib::finalize::EmptyResolver;
use pkgmatrix_lib::manifest::FailureKind;
use pkgmatrix_lib::plan::OrderError;

use super::common::{index, plan, plan_with, recipe};

const INDEX: &str = r#"
packages:
  numpy:
    - version: '1.26.4'
    - version: '2.0.1'
  libgcc:
    - version: '13.2.0'
      run_exports:
        strong: ['libgcc >=13.2.0']
"#;

#[test]
fn pin_compatible_uses_resolved_host_version() {
  let manifest = plan_with(
    &[recipe(
      "scipy",
      "numpy: ['1.26']\n",
      r#"
        return {
          package = { name = 'scipy', version = '1.12.0' },
          requirements = {
            host = { 'numpy' },
            run = { pin_compatible('numpy', { max_pin = 'x.x' }) },
          },
        }
      "#,
    )],
    &index(INDEX),
  );
  let run: Vec<String> = manifest.configurations[0]
    .requirements
    .run
    .iter()
    .map(ToString::to_string)
    .collect();
  assert_eq!(run, vec!["numpy >=1.26.4,<1.27.0a0"]);
}

#[test]
fn strong_exports_of_build_dependencies_reach_run() {
  let manifest = plan_with(
    &[recipe(
      "tool",
      "{}",
      r#"
        return {
          package = { name = 'tool', version = '1.0' },
          requirements = { build = { 'libgcc' } },
        }
      "#,
    )],
    &index(INDEX),
  );
  let run: Vec<String> = manifest.configurations[0]
    .requirements
    .run
    .iter()
    .map(ToString::to_string)
    .collect();
  assert_eq!(run, vec!["libgcc >=13.2.0"]);
}

#[test]
fn exact_subpackage_pin_orders_outputs() {
  let manifest = plan(&[recipe(
    "foo",
    "openssl: ['3']\n",
    r#"
      return {
        package = { name = 'foo', version = '1.0' },
        outputs = {
          {
            name = 'foo-tools',
            requirements = { run = { pin_subpackage('libfoo', { exact = true }) } },
          },
          {
            name = 'libfoo',
            requirements = { host = { 'openssl' } },
          },
        },
      }
    "#,
  )]);
  let names: Vec<&str> = manifest.configurations.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, vec!["libfoo", "foo-tools", "foo"]);
  let libfoo = &manifest.configurations[0];
  let tools = &manifest.configurations[1];
  assert_eq!(tools.requirements.run, vec![libfoo.exact_spec()]);
  assert_eq!(tools.depends_on, vec![libfoo.filename()]);
  assert!(manifest.configurations[2].metapackage);
}

#[test]
fn cyclic_exact_pins_fail_the_variant() {
  let manifest = plan(&[recipe(
    "loop",
    "{}",
    r#"
      return {
        package = { name = 'loop', version = '1.0' },
        outputs = {
          { name = 'a', requirements = { run = { pin_subpackage('b', { exact = true }) } } },
          { name = 'b', requirements = { run = { pin_subpackage('a', { exact = true }) } } },
        },
      }
    "#,
  )]);
  assert!(manifest.configurations.is_empty());
  assert_eq!(manifest.failures.len(), 1);
  assert_eq!(manifest.failures[0].kind, FailureKind::CyclicPin);
}

#[test]
fn pin_to_unknown_output_fails_the_variant() {
  let manifest = plan(&[recipe(
    "dangling",
    "{}",
    r#"
      return {
        package = { name = 'dangling', version = '1.0' },
        requirements = { run = { pin_subpackage('ghost') } },
      }
    "#,
  )]);
  assert_eq!(manifest.failures.len(), 1);
  assert_eq!(manifest.failures[0].kind, FailureKind::UnresolvedPin);
}

#[test]
fn producer_recipes_come_first_and_form_waves() {
  let recipes = [
    recipe(
      "app",
      "python: ['3.11', '3.12']\n",
      r#"
        return {
          package = { name = 'app', version = '0.3' },
          requirements = { host = { 'python', 'libcore' } },
        }
      "#,
    ),
    recipe(
      "libcore",
      "{}",
      r#"
        return {
          package = { name = 'libcore', version = '2.1.0' },
          build = { run_exports = { pin_subpackage('libcore', { max_pin = 'x' }) } },
        }
      "#,
    ),
  ];
  let manifest = plan(&recipes);
  assert_eq!(
    manifest.filenames(),
    vec!["libcore-2.1.0-0", "app-0.3-py311_0", "app-0.3-py312_0"]
  );
  assert_eq!(manifest.waves, vec![vec![0], vec![1, 2]]);
  for app in &manifest.configurations[1..] {
    let run: Vec<String> = app.requirements.run.iter().map(ToString::to_string).collect();
    assert!(run.contains(&"libcore >=2.1.0,<3.0a0".to_string()), "got {:?}", run);
  }
}

#[test]
fn recipe_cycle_aborts_the_run() {
  let recipes = [
    recipe(
      "x",
      "{}",
      "return { package = { name = 'x', version = '1' }, requirements = { build = { 'y' } } }",
    ),
    recipe(
      "y",
      "{}",
      "return { package = { name = 'y', version = '1' }, requirements = { host = { 'x' } } }",
    ),
  ];
  let Err(EvalError::Order(OrderError::CyclicDependency { cycle })) = build_plan(&recipes, &EmptyResolver) else {
    panic!("expected a dependency cycle");
  };
  assert_eq!(cycle, vec!["x", "y", "x"]);
}

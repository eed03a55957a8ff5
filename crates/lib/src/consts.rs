//! Crate-wide constants.

/// Number of hex characters kept from the build-string digest.
pub const HASH_LENGTH: usize = 7;

/// File name of a recipe script inside a recipe directory.
pub const RECIPE_FILE: &str = "recipe.lua";

/// File name of the per-recipe variant configuration.
pub const RECIPE_VARIANTS_FILE: &str = "variants.yaml";

/// Environment variable naming a global variant configuration file.
pub const VARIANT_CONFIG_ENV: &str = "PKGMATRIX_VARIANT_CONFIG";

/// Reserved variant keys.
pub const ZIP_KEYS: &str = "zip_keys";
pub const EXTEND_KEYS: &str = "extend_keys";
pub const FORCE_USE_KEYS: &str = "force_use_keys";
pub const FORCE_IGNORE_KEYS: &str = "force_ignore_keys";
pub const PIN_RUN_AS_BUILD: &str = "pin_run_as_build";
pub const IGNORE_VERSION: &str = "ignore_version";
pub const IGNORE_BUILD_ONLY_DEPS: &str = "ignore_build_only_deps";

/// Keys merged across layers instead of replaced, and never exploded.
pub const BUILTIN_EXTEND_KEYS: &[&str] = &[PIN_RUN_AS_BUILD, IGNORE_VERSION, IGNORE_BUILD_ONLY_DEPS];

pub const TARGET_PLATFORM: &str = "target_platform";

/// Parameters that get their own build-string tag instead of feeding the hash.
///
/// Entries are `(parameter, package name, tag)` in the order the tags are emitted.
pub const LEGACY_BUILD_STRING_KEYS: &[(&str, &str, &str)] = &[
  ("numpy", "numpy", "np"),
  ("python", "python", "py"),
  ("perl", "perl", "pl"),
  ("lua", "lua", "lua"),
  ("r_base", "r-base", "r"),
];

pub const DEFAULT_MIN_PIN: &str = "x.x.x.x.x.x";
pub const DEFAULT_MAX_PIN: &str = "x";

/// Metatable marker for `pin_subpackage(...)` tables.
pub const PIN_SUBPACKAGE_TYPE: &str = "PinSubpackage";

/// Metatable marker for `pin_compatible(...)` tables.
pub const PIN_COMPATIBLE_TYPE: &str = "PinCompatible";

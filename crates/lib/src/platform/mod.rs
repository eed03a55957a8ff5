//! Target platform identification.
//!
//! Platforms are named by package subdir (`linux-64`, `osx-arm64`, `win-64`),
//! which is also the value of the `target_platform` variant parameter.

pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use std::fmt;

/// Platform identifier combining OS and architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// `None` for combinations that have no package subdir.
  pub fn new(arch: Arch, os: Os) -> Option<Self> {
    arch.subdir_suffix(os).map(|_| Self { arch, os })
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Self::new(Arch::current()?, Os::current()?)
  }

  /// Parse a package subdir such as `linux-64` or `osx-arm64`.
  pub fn from_subdir(subdir: &str) -> Option<Self> {
    let (os, arch) = subdir.split_once('-')?;
    let os = Os::from_subdir_prefix(os)?;
    let arch = Arch::from_subdir_suffix(os, arch)?;
    Some(Self { arch, os })
  }

  /// Returns the package subdir (e.g., "osx-arm64")
  pub fn subdir(&self) -> String {
    format!("{}-{}", self.os, self.arch.subdir_suffix(self.os).unwrap_or("64"))
  }

  /// Native compiler package for a language on this platform.
  pub fn default_compiler(&self, language: &str) -> String {
    let native = match (self.os, language) {
      (Os::Windows, "c" | "cxx") => "vs2017",
      (Os::MacOs, "c") => "clang",
      (Os::MacOs, "cxx") => "clangxx",
      (_, "c") => "gcc",
      (_, "cxx") => "gxx",
      (_, "fortran") => "gfortran",
      (_, other) => other,
    };
    native.to_string()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.subdir())
  }
}

/// Returns the subdir of the current system (e.g., "linux-64")
///
/// Returns `None` if the current platform is not supported
pub fn current_subdir() -> Option<String> {
  Platform::current().map(|p| p.subdir())
}

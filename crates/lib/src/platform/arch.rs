use super::os::Os;

/// CPU architectures with a package subdir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  Aarch64,
  Ppc64le,
}

impl Arch {
  /// Architecture of the running binary.
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      "powerpc64" if cfg!(target_endian = "little") => Some(Self::Ppc64le),
      _ => None,
    }
  }

  /// The part of a subdir after the OS prefix. Apple and Windows call
  /// 64-bit ARM `arm64`, Linux calls it `aarch64`.
  pub fn subdir_suffix(&self, os: Os) -> Option<&'static str> {
    match (os, self) {
      (_, Self::X86_64) => Some("64"),
      (Os::Linux, Self::Aarch64) => Some("aarch64"),
      (Os::MacOs | Os::Windows, Self::Aarch64) => Some("arm64"),
      (Os::Linux, Self::Ppc64le) => Some("ppc64le"),
      (_, Self::Ppc64le) => None,
    }
  }

  pub fn from_subdir_suffix(os: Os, suffix: &str) -> Option<Self> {
    [Self::X86_64, Self::Aarch64, Self::Ppc64le]
      .into_iter()
      .find(|arch| arch.subdir_suffix(os) == Some(suffix))
  }
}

//! Package versions, constraint matching and pin expressions.
//!
//! Versions are dotted sequences of components; each component is a run of
//! numeric and alphabetic parts (`1.0.2j` is `1`, `0`, `2j`). Alphabetic parts
//! sort before numeric ones so `1.3.0a0 < 1.3.0`, except `post` which sorts
//! last and `dev` which sorts first.

use std::cmp::Ordering;
use std::fmt;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
  Num(u64),
  Str(String),
}

impl Part {
  fn rank(&self) -> u8 {
    match self {
      Part::Str(s) if s == "dev" => 0,
      Part::Str(s) if s == "post" => 3,
      Part::Str(_) => 1,
      Part::Num(_) => 2,
    }
  }
}

impl Ord for Part {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Part::Num(a), Part::Num(b)) => a.cmp(b),
      (Part::Str(a), Part::Str(b)) if self.rank() == other.rank() => a.cmp(b),
      _ => self.rank().cmp(&other.rank()),
    }
  }
}

impl PartialOrd for Part {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for Part {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Part::Num(n) => write!(f, "{}", n),
      Part::Str(s) => write!(f, "{}", s),
    }
  }
}

const ZERO: Part = Part::Num(0);

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct Version {
  raw: String,
  components: Vec<Vec<Part>>,
}

impl Version {
  pub fn parse(raw: &str) -> Self {
    let raw = raw.trim();
    let components = raw
      .split(['.', '_', '-'])
      .map(parse_component)
      .collect::<Vec<_>>();
    Self {
      raw: raw.to_string(),
      components,
    }
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  fn has_alpha(&self) -> bool {
    self
      .components
      .iter()
      .flatten()
      .any(|p| matches!(p, Part::Str(_)))
  }

  /// True when the leading components equal `prefix`'s components.
  pub fn starts_with(&self, prefix: &Version) -> bool {
    prefix.components.iter().enumerate().all(|(idx, pattern)| {
      let ours = self.components.get(idx).map(Vec::as_slice).unwrap_or(&[]);
      compare_component(ours, pattern) == Ordering::Equal
    })
  }

  /// Flattened parts tagged with the index of the component they came from.
  fn flat(&self) -> Vec<(Part, usize)> {
    self
      .components
      .iter()
      .enumerate()
      .flat_map(|(idx, parts)| parts.iter().cloned().map(move |p| (p, idx)))
      .collect()
  }
}

fn parse_component(text: &str) -> Vec<Part> {
  let mut parts = Vec::new();
  let mut chars = text.chars().peekable();
  while let Some(&c) = chars.peek() {
    if c.is_ascii_digit() {
      let mut digits = String::new();
      while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
        digits.push(d);
        chars.next();
      }
      parts.push(Part::Num(digits.parse().unwrap_or(u64::MAX)));
    } else if c.is_alphabetic() {
      let mut letters = String::new();
      while let Some(&a) = chars.peek().filter(|a| a.is_alphabetic()) {
        letters.push(a.to_ascii_lowercase());
        chars.next();
      }
      parts.push(Part::Str(letters));
    } else {
      chars.next();
    }
  }
  if parts.is_empty() {
    parts.push(ZERO);
  }
  parts
}

fn compare_component(a: &[Part], b: &[Part]) -> Ordering {
  let len = a.len().max(b.len());
  for idx in 0..len {
    let left = a.get(idx).unwrap_or(&ZERO);
    let right = b.get(idx).unwrap_or(&ZERO);
    match left.cmp(right) {
      Ordering::Equal => continue,
      other => return other,
    }
  }
  Ordering::Equal
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    let zero = [ZERO];
    let len = self.components.len().max(other.components.len());
    for idx in 0..len {
      let left = self.components.get(idx).map(Vec::as_slice).unwrap_or(&zero);
      let right = other.components.get(idx).map(Vec::as_slice).unwrap_or(&zero);
      match compare_component(left, right) {
        Ordering::Equal => continue,
        other => return other,
      }
    }
    Ordering::Equal
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.raw)
  }
}

/// Check a version against a constraint such as `>=1.2,<2` or `1.2.*|2.0`.
///
/// A bare version without an operator matches as a prefix, so `3.10` accepts
/// `3.10.12`. An empty constraint or `*` accepts everything.
pub fn matches(version: &str, constraint: &str) -> bool {
  let version = Version::parse(version);
  constraint
    .split('|')
    .any(|alternative| alternative.split(',').all(|term| matches_term(&version, term.trim())))
}

fn matches_term(version: &Version, term: &str) -> bool {
  if term.is_empty() || term == "*" {
    return true;
  }

  let operators: [(&str, fn(Ordering) -> bool); 6] = [
    (">=", |o| o != Ordering::Less),
    ("<=", |o| o != Ordering::Greater),
    ("==", |o| o == Ordering::Equal),
    ("!=", |o| o != Ordering::Equal),
    (">", |o| o == Ordering::Greater),
    ("<", |o| o == Ordering::Less),
  ];

  for (op, accept) in operators {
    if let Some(rest) = term.strip_prefix(op) {
      let rest = rest.trim();
      if let Some(prefix) = wildcard_prefix(rest) {
        let starts = version.starts_with(&Version::parse(prefix));
        return if op == "!=" { !starts } else { starts };
      }
      return accept(version.cmp(&Version::parse(rest)));
    }
  }

  if let Some(rest) = term.strip_prefix("~=") {
    let target = Version::parse(rest.trim());
    let mut prefix = target.clone();
    if prefix.components.len() > 1 {
      prefix.components.pop();
    }
    return *version >= target && version.starts_with(&prefix);
  }

  let term = term.strip_prefix('=').unwrap_or(term);
  let prefix = wildcard_prefix(term).unwrap_or(term);
  version.starts_with(&Version::parse(prefix))
}

fn wildcard_prefix(text: &str) -> Option<&str> {
  text
    .strip_suffix(".*")
    .or_else(|| text.strip_suffix('*'))
}

fn pin_places(expression: &str) -> usize {
  expression.split('.').count()
}

fn join_flat(parts: &[(Part, usize)]) -> String {
  let mut out = String::new();
  for (idx, (part, component)) in parts.iter().enumerate() {
    if idx > 0 && parts[idx - 1].1 != *component {
      out.push('.');
    }
    out.push_str(&part.to_string());
  }
  out
}

/// `None` when a numeric part is already at its maximum.
fn increment(part: &Part) -> Option<Part> {
  match part {
    Part::Num(n) => n.checked_add(1).map(Part::Num),
    Part::Str(s) => {
      let mut chars: Vec<char> = s.chars().collect();
      if let Some(last) = chars.last_mut() {
        *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
      }
      Some(Part::Str(chars.into_iter().collect()))
    }
  }
}

/// Turn a concrete version into a compatible range.
///
/// `min_pin` and `max_pin` count places (`x.x` is two). The lower bound keeps
/// `min_pin` places; the upper bound keeps `max_pin` places and increments the
/// last one. Numeric upper bounds get a `.0a0` suffix (`a` for versions that
/// contain letters) so pre-releases of the next version are excluded.
///
/// ```
/// use pkgmatrix_lib::version::apply_pin_expressions;
/// assert_eq!(apply_pin_expressions("1.2.3", Some("x.x.x"), Some("x.x")), ">=1.2.3,<1.3.0a0");
/// ```
pub fn apply_pin_expressions(version: &str, min_pin: Option<&str>, max_pin: Option<&str>) -> String {
  let parsed = Version::parse(version.trim_end_matches(".*").trim_end_matches('*'));
  let flat = parsed.flat();
  let mut bounds = Vec::new();

  if let Some(min_pin) = min_pin.filter(|p| !p.is_empty()) {
    let places = pin_places(min_pin).min(flat.len());
    let mut lower = join_flat(&flat[..places]);
    if parsed < Version::parse(&lower) {
      lower = version.to_string();
    }
    bounds.push(format!(">={}", lower));
  }

  if let Some(max_pin) = max_pin.filter(|p| !p.is_empty()) {
    let places = pin_places(max_pin).min(flat.len());
    if places > 0 {
      let mut upper: Vec<(Part, usize)> = flat[..places].to_vec();
      let last = places - 1;
      match increment(&upper[last].0) {
        Some(next) => {
          upper[last].0 = next;
          let suffix = match upper[last].0 {
            Part::Str(_) => "",
            Part::Num(_) if parsed.has_alpha() => "a",
            Part::Num(_) => ".0a0",
          };
          bounds.push(format!("<{}{}", join_flat(&upper), suffix));
        }
        None => warn!(version, max_pin, "version component too large to increment, leaving pin without upper bound"),
      }
    }
  }

  bounds.join(",")
}

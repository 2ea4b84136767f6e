use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// A JavaScript String value.
///
/// Strings are immutable and shared; cloning only bumps a reference count. Unlike a full engine,
/// this crate stores strings as UTF-8 since it never needs code-unit indexing.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl JsString {
  pub fn new(s: &str) -> Self {
    Self(Rc::from(s))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Deref for JsString {
  type Target = str;

  fn deref(&self) -> &str {
    &self.0
  }
}

impl From<&str> for JsString {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for JsString {
  fn from(value: String) -> Self {
    Self(Rc::from(value))
  }
}

impl fmt::Debug for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl fmt::Display for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

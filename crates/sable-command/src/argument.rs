//! The positional argument grammar: required, optional, and variadic specs.
//!
//! A command declares an ordered [`ArgumentInfo`]; at dispatch time the
//! remaining tokens are bound against it. Usage strings render required
//! arguments as `<name>`, optional as `(name)`, and variadic as `(name...)`.

use std::collections::HashMap;

use sable_types::SableError;

use crate::tokenizer::Arguments;

/// How a declared argument consumes tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// Must be present; binding fails without it.
    Required,
    /// Fills from the next token when one is left, absent otherwise.
    Optional,
    /// Consumes every remaining token, possibly none. Must be last.
    Variadic,
}

/// One declared argument: a name, a human-readable description, and a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub name: String,
    pub description: String,
    pub kind: ArgumentKind,
}

impl ArgumentSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ArgumentKind::Required)
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ArgumentKind::Optional)
    }

    pub fn variadic(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ArgumentKind::Variadic)
    }

    fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ArgumentKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
        }
    }

    /// Render this argument for a usage string.
    pub fn render(&self) -> String {
        match self.kind {
            ArgumentKind::Required => format!("<{}>", self.name),
            ArgumentKind::Optional => format!("({})", self.name),
            ArgumentKind::Variadic => format!("({}...)", self.name),
        }
    }
}

/// The ordered argument shape a command declares.
///
/// Invariant: at most one variadic argument, and only in the last position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentInfo {
    specs: Vec<ArgumentSpec>,
}

impl ArgumentInfo {
    /// Build an argument shape, enforcing the variadic-last invariant.
    pub fn new(specs: Vec<ArgumentSpec>) -> Result<Self, SableError> {
        let last = specs.len().saturating_sub(1);
        for (i, spec) in specs.iter().enumerate() {
            if spec.kind == ArgumentKind::Variadic && i != last {
                return Err(SableError::InvalidCommand(format!(
                    "variadic argument '{}' must be last",
                    spec.name
                )));
            }
        }
        Ok(Self { specs })
    }

    /// A command that takes no arguments.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn specs(&self) -> &[ArgumentSpec] {
        &self.specs
    }

    /// Bind the remaining tokens against this shape.
    ///
    /// Fails with [`SableError::MissingArgument`] naming the first required
    /// argument that has no token. Optionals fill in order and are absent when
    /// tokens run out; a trailing variadic takes everything left.
    pub fn bind(&self, args: &mut Arguments) -> Result<BoundArguments, SableError> {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for spec in &self.specs {
            match spec.kind {
                ArgumentKind::Required => match args.next() {
                    Some(token) => {
                        values.insert(spec.name.clone(), vec![token.to_string()]);
                    }
                    None => return Err(SableError::MissingArgument(spec.name.clone())),
                },
                ArgumentKind::Optional => {
                    if let Some(token) = args.next() {
                        values.insert(spec.name.clone(), vec![token.to_string()]);
                    }
                }
                ArgumentKind::Variadic => {
                    values.insert(spec.name.clone(), args.drain_remaining());
                }
            }
        }
        Ok(BoundArguments { values })
    }

    /// Render the argument portion of a usage string, e.g. `<a> (b) (c...)`.
    pub fn usage(&self) -> String {
        self.specs
            .iter()
            .map(ArgumentSpec::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render a per-argument detail listing for help output.
    pub fn parameter_detail(&self) -> String {
        if self.specs.is_empty() {
            return "This command takes no arguments.".into();
        }
        self.specs
            .iter()
            .map(|s| format!("`{}`: {}", s.render(), s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Argument values produced by a successful bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArguments {
    values: HashMap<String, Vec<String>>,
}

impl BoundArguments {
    /// The single value bound to `name`, if present. For a variadic argument
    /// this is its first token.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every token bound to `name`; empty for an absent optional or an empty
    /// variadic.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `name` received at least one token.
    pub fn has(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> ArgumentInfo {
        ArgumentInfo::new(vec![
            ArgumentSpec::required("a", "first"),
            ArgumentSpec::optional("b", "second"),
            ArgumentSpec::variadic("c", "rest"),
        ])
        .unwrap()
    }

    #[test]
    fn full_binding_fills_all_slots() {
        let mut args = Arguments::new(vec!["x".into(), "y".into(), "z".into(), "w".into()]);
        let bound = shape().bind(&mut args).unwrap();
        assert_eq!(bound.get("a"), Some("x"));
        assert_eq!(bound.get("b"), Some("y"));
        assert_eq!(bound.get_all("c"), &["z".to_string(), "w".to_string()]);
    }

    #[test]
    fn optionals_absent_when_tokens_run_out() {
        let mut args = Arguments::new(vec!["x".into()]);
        let bound = shape().bind(&mut args).unwrap();
        assert_eq!(bound.get("a"), Some("x"));
        assert_eq!(bound.get("b"), None);
        assert!(!bound.has("b"));
        assert!(bound.get_all("c").is_empty());
    }

    #[test]
    fn missing_required_names_first_missing() {
        let mut args = Arguments::new(vec![]);
        let err = shape().bind(&mut args).unwrap_err();
        match err {
            SableError::MissingArgument(name) => assert_eq!(name, "a"),
            other => panic!("expected MissingArgument, got: {other}"),
        }
    }

    #[test]
    fn variadic_must_be_last() {
        let err = ArgumentInfo::new(vec![
            ArgumentSpec::variadic("rest", "everything"),
            ArgumentSpec::required("a", "first"),
        ])
        .unwrap_err();
        assert!(
            err.to_string().contains("must be last"),
            "expected variadic-last error, got: {err}"
        );
    }

    #[test]
    fn usage_rendering() {
        assert_eq!(shape().usage(), "<a> (b) (c...)");
        assert_eq!(ArgumentInfo::none().usage(), "");
    }

    #[test]
    fn parameter_detail_lists_each_argument() {
        let detail = shape().parameter_detail();
        assert!(detail.contains("`<a>`: first"));
        assert!(detail.contains("`(b)`: second"));
        assert!(detail.contains("`(c...)`: rest"));
        assert_eq!(
            ArgumentInfo::none().parameter_detail(),
            "This command takes no arguments."
        );
    }
}

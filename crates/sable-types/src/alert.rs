//! Structured command responses.
//!
//! Every command execution yields an [`Alert`]: a titled, typed response with
//! optional named fields. The gateway decides how to render it (embed, plain
//! text, ...); this core only builds the structure.

use serde::{Deserialize, Serialize};

/// The tone of an alert. Gateways typically map this to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    Info,
    Success,
    Error,
}

/// A named field inside an alert body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertField {
    pub name: String,
    pub value: String,
}

/// A structured response produced by command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub fields: Vec<AlertField>,
}

impl Alert {
    /// An informational alert.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(AlertKind::Info, title, description)
    }

    /// A success alert.
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(AlertKind::Success, title, description)
    }

    /// An error alert, shown to the user when dispatch or execution fails.
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(AlertKind::Error, title, description)
    }

    fn new(kind: AlertKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    /// Append a named field, builder-style.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AlertField {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_constructors_set_kind() {
        assert_eq!(Alert::info("t", "d").kind, AlertKind::Info);
        assert_eq!(Alert::success("t", "d").kind, AlertKind::Success);
        assert_eq!(Alert::error("t", "d").kind, AlertKind::Error);
    }

    #[test]
    fn alert_fields_preserve_order() {
        let alert = Alert::info("Command Information", "details")
            .field("Description", "does things")
            .field("Usage", "!cmd <a>")
            .field("Aliases", "c");

        let names: Vec<&str> = alert.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Description", "Usage", "Aliases"]);
    }
}

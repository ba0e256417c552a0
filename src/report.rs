//! Human-readable dump output

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Field { label: String, value: String },
    Text(String),
    Separator,
}

/// Ordered dump of a contract, printed by the console
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<Line>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Label: value`
    pub fn field(&mut self, label: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.lines.push(Line::Field {
            label: label.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(Line::Text(text.into()));
        self
    }

    pub fn separator(&mut self) -> &mut Self {
        self.lines.push(Line::Separator);
        self
    }

    pub fn append(&mut self, other: Report) -> &mut Self {
        self.lines.extend(other.lines);
        self
    }

    /// Value of the first field with this label
    pub fn value(&self, label: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Field { label: l, value } if l == label => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Field { label, value } => writeln!(f, "{}: {}", label, value)?,
                Line::Text(text) => writeln!(f, "{}", text)?,
                Line::Separator => writeln!(f, "{}", "-".repeat(40))?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut report = Report::new();
        report.field("Name", "CoboFactory").separator().text("  done");

        assert_eq!(report.value("Name"), Some("CoboFactory"));
        assert_eq!(report.value("Owner"), None);
        assert_eq!(
            report.to_string(),
            format!("Name: CoboFactory\n{}\n  done\n", "-".repeat(40))
        );
    }

    #[test]
    fn test_append_keeps_order() {
        let mut a = Report::new();
        a.field("A", 1);
        let mut b = Report::new();
        b.field("B", 2);
        a.append(b);
        assert_eq!(a.to_string(), "A: 1\nB: 2\n");
    }
}

//! Plain-text rendering of records for terminal output.

use bizflow_model::{Customer, Lead, Note, Task};

/// One-line summary of a record.
pub(crate) trait Line {
    fn line(&self) -> String;
}

impl Line for Customer {
    fn line(&self) -> String {
        if self.tags.is_empty() {
            format!("{}  {} <{}>", self.meta.id, self.name, self.email)
        } else {
            format!(
                "{}  {} <{}> [{}]",
                self.meta.id,
                self.name,
                self.email,
                self.tags.join(", ")
            )
        }
    }
}

impl Line for Lead {
    fn line(&self) -> String {
        format!("{}  {}  ${}  ({})", self.meta.id, self.name, self.amount, self.stage)
    }
}

impl Line for Task {
    fn line(&self) -> String {
        match &self.project_id {
            Some(project) => format!("{}  {}  ({}, {})", self.meta.id, self.title, self.stage, project),
            None => format!("{}  {}  ({})", self.meta.id, self.title, self.stage),
        }
    }
}

impl Line for Note {
    fn line(&self) -> String {
        let first = self.content.lines().next().unwrap_or_default();
        format!("{}  {}  {}", self.meta.id, self.customer_id, first)
    }
}

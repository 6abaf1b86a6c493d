use serde::Serialize;
use std::fmt;

use crate::types::RowValues;

/// Logical action applied to the master document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// Canonical change event handed to sinks, serialized as `{"action": ..., "doc": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub doc: RowValues,
}

impl ChangeEvent {
    pub fn new(action: ChangeAction, doc: RowValues) -> Self {
        Self { action, doc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[test]
    fn test_change_event_wire_shape() {
        let event = ChangeEvent::new(
            ChangeAction::Create,
            [("id", Cell::I64(42)), ("status", Cell::from("new"))]
                .into_iter()
                .collect(),
        );

        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"action":"create","doc":{"id":42,"status":"new"}}"#
        );
    }
}

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::types::Cell;

/// Column name to value mapping of a single row, in table column order.
///
/// Serializes as a JSON object whose keys keep the column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    columns: Vec<(String, Cell)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Sets the value of `column`, keeping its position if it is already present.
    pub fn insert(&mut self, column: impl Into<String>, value: Cell) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K> FromIterator<(K, Cell)> for RowValues
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        let mut values = RowValues::new();
        for (column, value) in iter {
            values.insert(column, value);
        }

        values
    }
}

impl IntoIterator for RowValues {
    type Item = (String, Cell);
    type IntoIter = std::vec::IntoIter<(String, Cell)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl Serialize for RowValues {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut values: RowValues = [("id", Cell::I64(1)), ("status", Cell::from("new"))]
            .into_iter()
            .collect();

        values.insert("id", Cell::I64(2));
        values.insert("total", Cell::F64(9.5));

        assert_eq!(values.columns().collect::<Vec<_>>(), vec!["id", "status", "total"]);
        assert_eq!(values.get("id"), Some(&Cell::I64(2)));
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_serializes_in_column_order() {
        let values: RowValues = [("z", Cell::I64(1)), ("a", Cell::Null)]
            .into_iter()
            .collect();

        assert_eq!(serde_json::to_string(&values).unwrap(), r#"{"z":1,"a":null}"#);
    }
}

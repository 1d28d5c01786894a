use crate::core::query::Connection;
use crate::core::record::Record;
use serde::Serialize;

/// Result of one resolved operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Record(Record),
    Records(Vec<Record>),
    Connection(Connection),
    Connections(Vec<Connection>),
}

impl OperationResult {
    /// Records of the result as a flat list, in result order
    pub fn to_records(&self) -> Vec<Record> {
        match self {
            OperationResult::Record(record) => vec![record.clone()],
            OperationResult::Records(records) => records.clone(),
            OperationResult::Connection(connection) => connection.nodes().cloned().collect(),
            OperationResult::Connections(connections) => connections
                .iter()
                .flat_map(|c| c.nodes().cloned())
                .collect(),
        }
    }

    /// Write back a list produced by [`to_records`](Self::to_records)
    ///
    /// Only a plain record list may change length; other shapes are updated
    /// position by position.
    pub fn replace_records(&mut self, records: Vec<Record>) {
        let mut records = records.into_iter();
        match self {
            OperationResult::Record(record) => {
                if let Some(replacement) = records.next() {
                    *record = replacement;
                }
            }
            OperationResult::Records(existing) => *existing = records.collect(),
            OperationResult::Connection(connection) => {
                for (edge, replacement) in connection.edges.iter_mut().zip(records) {
                    edge.node = replacement;
                }
            }
            OperationResult::Connections(connections) => {
                for edge in connections.iter_mut().flat_map(|c| c.edges.iter_mut()) {
                    match records.next() {
                        Some(replacement) => edge.node = replacement,
                        None => break,
                    }
                }
            }
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            OperationResult::Record(record) => Some(record),
            OperationResult::Records(records) => records.into_iter().next(),
            _ => None,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            OperationResult::Record(record) => vec![record],
            OperationResult::Records(records) => records,
            OperationResult::Connection(connection) => connection.into_nodes(),
            OperationResult::Connections(connections) => connections
                .into_iter()
                .flat_map(Connection::into_nodes)
                .collect(),
        }
    }
}

/// What a resolver hands back to the runner
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOutput {
    pub data: OperationResult,
    /// Formatted pre-images of the affected records, for mutations that
    /// read them before writing
    pub previous: Vec<Record>,
}

impl ResolverOutput {
    pub fn new(data: OperationResult) -> Self {
        Self {
            data,
            previous: Vec::new(),
        }
    }

    pub fn with_previous(mut self, previous: Vec<Record>) -> Self {
        self.previous = previous;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::single_page;
    use serde_json::json;
    use uuid::Uuid;

    fn record(name: &str) -> Record {
        Record::from_value(json!({"id": Uuid::new_v4().to_string(), "name": name})).unwrap()
    }

    #[test]
    fn test_records_round_trip_through_hooks() {
        let mut result = OperationResult::Connections(vec![
            single_page(vec![record("a"), record("b")]),
            single_page(vec![record("c")]),
        ]);

        let mut records = result.to_records();
        assert_eq!(records.len(), 3);
        for record in &mut records {
            record.set("seen", json!(true));
        }
        result.replace_records(records);

        assert!(result.to_records().iter().all(|r| r["seen"] == true));
    }

    #[test]
    fn test_record_list_may_shrink() {
        let mut result = OperationResult::Records(vec![record("a"), record("b")]);
        let mut records = result.to_records();
        records.pop();
        result.replace_records(records);
        assert_eq!(result.into_records().len(), 1);
    }
}

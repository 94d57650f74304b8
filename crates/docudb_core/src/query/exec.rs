//! Query execution: filter, sort, skip, limit, projection.

use crate::document::{self, Document};
use crate::error::QueryError;
use crate::query::{compile, Node};
use serde_json::Value;
use std::cmp::Ordering;

/// A compiled query with its execution options.
#[derive(Debug, Clone)]
pub struct Query {
    criteria: Value,
    node: Node,
    sort: Vec<(String, i8)>,
    skip: usize,
    limit: Option<usize>,
    select: Option<Vec<String>>,
}

impl Query {
    /// Compiles criteria into an executable query.
    pub fn new(criteria: Value) -> Result<Self, QueryError> {
        let node = compile(&criteria)?;
        Ok(Self {
            criteria,
            node,
            sort: Vec::new(),
            skip: 0,
            limit: None,
            select: None,
        })
    }

    /// Returns the raw criteria.
    #[must_use]
    pub fn criteria(&self) -> &Value {
        &self.criteria
    }

    /// Sets the sort order: `(field, ±1)` with earlier entries taking
    /// precedence.
    #[must_use]
    pub fn sort(mut self, fields: Vec<(String, i8)>) -> Self {
        self.sort = fields;
        self
    }

    /// Sets the number of leading results to drop.
    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts output to an inclusion list of dot paths. `_id` is
    /// always retained.
    #[must_use]
    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    /// Evaluates the criteria against one document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.node.matches(doc)
    }

    /// Filters the documents, then applies sort, skip, limit, and
    /// projection.
    #[must_use]
    pub fn execute(&self, docs: Vec<Document>) -> Vec<Document> {
        let matched = docs.into_iter().filter(|d| self.matches(d)).collect();
        self.post_process(matched)
    }

    /// Applies sort, skip, limit, and projection to already-filtered
    /// documents (the index-assisted path rechecks criteria separately).
    #[must_use]
    pub fn post_process(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if !self.sort.is_empty() {
            docs.sort_by(|a, b| self.compare_docs(a, b));
        }

        let docs = docs.into_iter().skip(self.skip);
        let docs: Vec<Document> = match self.limit {
            Some(limit) => docs.take(limit).collect(),
            None => docs.collect(),
        };

        match &self.select {
            Some(fields) => docs.iter().map(|d| project(d, fields)).collect(),
            None => docs,
        }
    }

    /// Lexicographic comparison over the sort fields; missing or
    /// incomparable values compare equal.
    fn compare_docs(&self, a: &Document, b: &Document) -> Ordering {
        for (field, direction) in &self.sort {
            let va = document::get_path(a, field);
            let vb = document::get_path(b, field);
            let ord = match (va, vb) {
                (Some(x), Some(y)) => {
                    document::compare_order(x, y).unwrap_or(Ordering::Equal)
                }
                _ => Ordering::Equal,
            };
            let ord = if *direction < 0 { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Builds the projected output, reconstructing nested objects from dot
/// paths. `_id` is always included.
fn project(doc: &Document, fields: &[String]) -> Document {
    let mut out = Document::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = document::get_path(doc, field) {
            document::set_path(&mut out, field, value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn names(result: &[Document]) -> Vec<&str> {
        result
            .iter()
            .map(|d| d.get("name").and_then(Value::as_str).unwrap())
            .collect()
    }

    fn inventory() -> Vec<Document> {
        docs(vec![
            json!({"_id": "1", "name": "Laptop", "price": 1000, "stock": 5}),
            json!({"_id": "2", "name": "Mouse", "price": 20, "stock": 10}),
            json!({"_id": "3", "name": "Keyboard", "price": 50, "stock": 8}),
        ])
    }

    #[test]
    fn filter_with_operator() {
        let query = Query::new(json!({"price": {"$gt": 50}})).unwrap();
        let result = query.execute(inventory());
        assert_eq!(names(&result), vec!["Laptop"]);
    }

    #[test]
    fn sort_ascending_and_descending() {
        let query = Query::new(json!({})).unwrap().sort(vec![("price".to_string(), 1)]);
        assert_eq!(names(&query.execute(inventory())), vec!["Mouse", "Keyboard", "Laptop"]);

        let query = Query::new(json!({})).unwrap().sort(vec![("price".to_string(), -1)]);
        assert_eq!(names(&query.execute(inventory())), vec!["Laptop", "Keyboard", "Mouse"]);
    }

    #[test]
    fn sort_precedence_follows_field_order() {
        let extra = docs(vec![
            json!({"_id": "4", "name": "Pad", "price": 20, "stock": 1}),
        ]);
        let mut all = inventory();
        all.extend(extra);

        let query = Query::new(json!({}))
            .unwrap()
            .sort(vec![("price".to_string(), 1), ("stock".to_string(), 1)]);
        assert_eq!(
            names(&query.execute(all)),
            vec!["Pad", "Mouse", "Keyboard", "Laptop"]
        );
    }

    #[test]
    fn missing_sort_values_compare_equal() {
        let items = docs(vec![
            json!({"_id": "1", "name": "A"}),
            json!({"_id": "2", "name": "B", "rank": 1}),
        ]);
        let query = Query::new(json!({})).unwrap().sort(vec![("rank".to_string(), 1)]);
        // No panic, stable order preserved for the missing value.
        assert_eq!(query.execute(items).len(), 2);
    }

    #[test]
    fn skip_and_limit() {
        let query = Query::new(json!({}))
            .unwrap()
            .sort(vec![("price".to_string(), 1)])
            .skip(1)
            .limit(1);
        assert_eq!(names(&query.execute(inventory())), vec!["Keyboard"]);
    }

    #[test]
    fn projection_keeps_id_and_rebuilds_nested_paths() {
        let items = docs(vec![json!({
            "_id": "1",
            "name": "Laptop",
            "meta": {"sku": "X1", "weight": 2},
            "price": 1000
        })]);
        let query = Query::new(json!({}))
            .unwrap()
            .select(vec!["name".to_string(), "meta.sku".to_string()]);

        let result = query.execute(items);
        assert_eq!(
            serde_json::to_value(&result[0]).unwrap(),
            json!({"_id": "1", "name": "Laptop", "meta": {"sku": "X1"}})
        );
    }

    #[test]
    fn execute_filters_before_post_processing() {
        let query = Query::new(json!({"stock": {"$gte": 8}}))
            .unwrap()
            .sort(vec![("stock".to_string(), -1)]);
        assert_eq!(names(&query.execute(inventory())), vec!["Mouse", "Keyboard"]);
    }
}

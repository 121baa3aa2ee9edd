use serde_json::Value;

/// One clause of a filter. All clauses must match for a document to match.
#[derive(Debug, Clone, PartialEq)]
enum Clause {
    /// The top-level field equals the value exactly.
    Eq(String, Value),
    /// The top-level field equals any of the values (OR within the field).
    In(String, Vec<Value>),
}

/// Exact-field-match filter over top-level document fields.
///
/// Built fluently: `Filter::new().eq("status", "Created")`. An empty filter
/// matches every document in the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Creates an empty filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match clause on a top-level field.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    /// Adds a clause matching the field against any of the given values.
    pub fn any_of(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.clauses
            .push(Clause::In(field.into(), values.into_iter().collect()));
        self
    }

    /// Returns true if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates the filter against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, value) => doc.get(field) == Some(value),
            Clause::In(field, values) => doc
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
        })
    }

    /// Renders the filter as SQL conditions over a JSONB `doc` column,
    /// returning the WHERE fragment and the bound JSON values.
    ///
    /// Parameter numbering starts at `first_param`.
    pub(crate) fn to_sql(&self, first_param: usize) -> (String, Vec<Value>) {
        if self.clauses.is_empty() {
            return ("TRUE".to_string(), Vec::new());
        }

        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        let mut param = first_param;

        for clause in &self.clauses {
            match clause {
                Clause::Eq(field, value) => {
                    conditions.push(format!("doc -> '{}' = ${param}", escape_field(field)));
                    binds.push(value.clone());
                    param += 1;
                }
                Clause::In(field, values) => {
                    let mut alternatives = Vec::new();
                    for value in values {
                        alternatives.push(format!("doc -> '{}' = ${param}", escape_field(field)));
                        binds.push(value.clone());
                        param += 1;
                    }
                    conditions.push(format!("({})", alternatives.join(" OR ")));
                }
            }
        }

        (conditions.join(" AND "), binds)
    }
}

/// Set-style partial update: each listed top-level field is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    sets: Vec<(String, Value)>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a top-level field to a value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((field.into(), value.into()));
        self
    }

    /// Returns true if the patch sets nothing.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Applies the patch to a document in place.
    ///
    /// Fails if the document is not a JSON object.
    pub fn apply(&self, doc: &mut Value) -> std::result::Result<(), ()> {
        let map = doc.as_object_mut().ok_or(())?;
        for (field, value) in &self.sets {
            map.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    /// Returns the patch as a single JSON object for a JSONB merge.
    pub(crate) fn as_object(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (field, value) in &self.sets {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Field names come from code, never from clients, but quoting them keeps
/// the SQL fragment well-formed if one ever contains a quote.
fn escape_field(field: &str) -> String {
    field.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_anything() {
        let filter = Filter::new();
        assert!(filter.matches(&json!({"a": 1})));
        assert!(filter.matches(&json!(null)));
    }

    #[test]
    fn eq_clause_matches_exact_field() {
        let filter = Filter::new().eq("status", "Created");
        assert!(filter.matches(&json!({"status": "Created", "x": 1})));
        assert!(!filter.matches(&json!({"status": "Paid"})));
        assert!(!filter.matches(&json!({"other": "Created"})));
    }

    #[test]
    fn clauses_are_anded() {
        let filter = Filter::new().eq("a", 1).eq("b", 2);
        assert!(filter.matches(&json!({"a": 1, "b": 2})));
        assert!(!filter.matches(&json!({"a": 1, "b": 3})));
    }

    #[test]
    fn any_of_matches_any_listed_value() {
        let filter = Filter::new().any_of("recipient", [json!("p-1"), json!("all")]);
        assert!(filter.matches(&json!({"recipient": "p-1"})));
        assert!(filter.matches(&json!({"recipient": "all"})));
        assert!(!filter.matches(&json!({"recipient": "p-2"})));
    }

    #[test]
    fn to_sql_numbers_parameters() {
        let filter = Filter::new().eq("a", 1).any_of("b", [json!(2), json!(3)]);
        let (sql, binds) = filter.to_sql(1);
        assert_eq!(sql, "doc -> 'a' = $1 AND (doc -> 'b' = $2 OR doc -> 'b' = $3)");
        assert_eq!(binds, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn empty_filter_renders_true() {
        let (sql, binds) = Filter::new().to_sql(1);
        assert_eq!(sql, "TRUE");
        assert!(binds.is_empty());
    }

    #[test]
    fn patch_replaces_listed_fields() {
        let patch = Patch::new().set("status", "Paid").set("n", 2);
        let mut doc = json!({"status": "Created", "n": 1, "keep": true});
        patch.apply(&mut doc).unwrap();
        assert_eq!(doc, json!({"status": "Paid", "n": 2, "keep": true}));
    }

    #[test]
    fn patch_fails_on_non_object() {
        let patch = Patch::new().set("a", 1);
        let mut doc = json!([1, 2]);
        assert!(patch.apply(&mut doc).is_err());
    }

    #[test]
    fn patch_as_object_collects_sets() {
        let patch = Patch::new().set("a", 1).set("b", "x");
        assert_eq!(patch.as_object(), json!({"a": 1, "b": "x"}));
    }
}

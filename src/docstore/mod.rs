//! Document store abstraction.
//!
//! The engine treats the document store's query language as opaque: it
//! only ever composes conjunctions of simple field comparisons (see
//! [`Filter`]) and never inspects metadata values except to inject or read
//! the three reserved fields in [`crate::types`].

pub mod memory;
pub mod redb_store;

use crate::error::Result;
use crate::types::Document;

/// A document store: insert, predicate-filtered find, and drop, over named
/// collections of [`Document`] rows.
///
/// `insertMany` is atomic per row: either every row in the batch is
/// accepted, or an error is returned and no partial set of rows is
/// visible to later reads on the same connection.
pub trait DocStore: Send + Sync {
    /// Inserts `rows` into `collection`, creating it if it does not exist.
    fn insert_many(&self, collection: &str, rows: Vec<Document>) -> Result<()>;

    /// Returns every row in `collection` matching `filter`.
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Returns the first row in `collection` matching `filter`, if any.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(collection, filter)?.into_iter().next())
    }

    /// Removes `collection` and all of its rows. Not an error if the
    /// collection does not exist.
    fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Lists the names of all collections currently known to the store.
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Replaces the row whose `key_field` equals `key_value` with `row`, or
    /// inserts `row` if no such row exists. Used by
    /// [`crate::catalog::Catalog`], whose entries are keyed by collection
    /// name and rewritten on every snapshot.
    ///
    /// The default implementation is expressed purely in terms of `find`,
    /// `drop_collection`, and `insert_many` so that any [`DocStore`] gets
    /// upsert semantics for free; a backend may override it with something
    /// cheaper than rewriting the whole collection.
    fn upsert_one(
        &self,
        collection: &str,
        key_field: &str,
        key_value: &crate::types::Value,
        row: Document,
    ) -> Result<()> {
        let mut rows = self.find(collection, &Filter::All)?;
        rows.retain(|existing| existing.get(key_field) != Some(key_value));
        rows.push(row);
        self.drop_collection(collection)?;
        self.insert_many(collection, rows)
    }
}

/// A structured predicate over a [`Document`]'s fields.
///
/// Deliberately small: the engine only ever needs equality/ordering
/// comparisons on scalar fields and their conjunction, composed
/// programmatically by [`crate::collection::Collection::query`] from the
/// caller-supplied filter and an internal `_m_id` restriction. It is not a
/// general query language.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Filter {
    /// Matches every row.
    All,
    /// `field == value`.
    Eq(String, crate::types::Value),
    /// `field > value` (numeric comparison only; non-numeric values never
    /// match).
    Gt(String, crate::types::Value),
    /// `field >= value`.
    Gte(String, crate::types::Value),
    /// `field < value`.
    Lt(String, crate::types::Value),
    /// `field <= value`.
    Lte(String, crate::types::Value),
    /// Every sub-filter must match.
    And(Vec<Filter>),
}

impl Filter {
    /// Evaluates this predicate against `doc`.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Gt(field, value) => compare(doc, field, value, |o| o == std::cmp::Ordering::Greater),
            Filter::Gte(field, value) => {
                compare(doc, field, value, |o| o != std::cmp::Ordering::Less)
            }
            Filter::Lt(field, value) => compare(doc, field, value, |o| o == std::cmp::Ordering::Less),
            Filter::Lte(field, value) => {
                compare(doc, field, value, |o| o != std::cmp::Ordering::Greater)
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Conjoins `self` with `other`, flattening nested [`Filter::And`]s.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), other) => {
                a.push(other);
                Filter::And(a)
            }
            (this, Filter::And(mut b)) => {
                b.insert(0, this);
                Filter::And(b)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }
}

fn compare(
    doc: &Document,
    field: &str,
    value: &crate::types::Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let (Some(a), Some(b)) = (doc.get(field).and_then(|v| v.as_f64()), value.as_f64()) else {
        return false;
    };
    a.partial_cmp(&b).map(accept).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn all_matches_everything() {
        assert!(Filter::All.matches(&doc(&[])));
    }

    #[test]
    fn eq_matches_equal_value() {
        let d = doc(&[("attr1", Value::from(1))]);
        assert!(Filter::Eq("attr1".into(), Value::from(1)).matches(&d));
        assert!(!Filter::Eq("attr1".into(), Value::from(2)).matches(&d));
    }

    #[test]
    fn gt_and_lte_use_numeric_comparison() {
        let d = doc(&[("n", Value::from(5))]);
        assert!(Filter::Gt("n".into(), Value::from(1)).matches(&d));
        assert!(!Filter::Gt("n".into(), Value::from(5)).matches(&d));
        assert!(Filter::Lte("n".into(), Value::from(5)).matches(&d));
    }

    #[test]
    fn missing_field_never_matches_comparison() {
        let d = doc(&[]);
        assert!(!Filter::Gt("n".into(), Value::from(1)).matches(&d));
    }

    #[test]
    fn and_requires_all_subfilters() {
        let d = doc(&[("a", Value::from(1)), ("b", Value::from(2))]);
        let f = Filter::And(vec![
            Filter::Eq("a".into(), Value::from(1)),
            Filter::Eq("b".into(), Value::from(2)),
        ]);
        assert!(f.matches(&d));
        let f2 = Filter::And(vec![
            Filter::Eq("a".into(), Value::from(1)),
            Filter::Eq("b".into(), Value::from(3)),
        ]);
        assert!(!f2.matches(&d));
    }

    #[test]
    fn and_combinator_flattens_nesting() {
        let combined = Filter::Eq("a".into(), Value::from(1)).and(Filter::Eq("b".into(), Value::from(2)));
        assert_eq!(
            combined,
            Filter::And(vec![
                Filter::Eq("a".into(), Value::from(1)),
                Filter::Eq("b".into(), Value::from(2)),
            ])
        );
    }

    #[test]
    fn upsert_one_default_impl_replaces_matching_row() {
        let store = memory::MemoryDocStore::new();
        let mut first = doc(&[("name", Value::from("c")), ("lastId", Value::from(1))]);
        store
            .upsert_one("meta", "name", &Value::from("c"), first.clone())
            .unwrap();
        first.insert("lastId".to_string(), Value::from(2));
        store
            .upsert_one("meta", "name", &Value::from("c"), first.clone())
            .unwrap();

        let rows = store.find("meta", &Filter::All).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("lastId"), Some(&Value::from(2)));
    }

    #[test]
    fn and_with_all_is_identity() {
        let f = Filter::Eq("a".into(), Value::from(1));
        assert_eq!(f.clone().and(Filter::All), f);
        assert_eq!(Filter::All.and(f.clone()), f);
    }
}

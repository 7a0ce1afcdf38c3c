//! Statically-typed table access.

use crate::error::CoreResult;
use crate::row::{Fields, Row};
use crate::store::LocalStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A Rust type stored as rows of one table.
///
/// The type serializes to a flat JSON object carrying an `id` string;
/// `updated_at` is optional and filled in by the store.
///
/// ```rust
/// use ebbtide_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct InventoryItem {
///     id: String,
///     name: String,
///     quantity: u32,
/// }
///
/// impl Record for InventoryItem {
///     const TABLE: &'static str = "inventory";
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned {
    /// Name of the table holding this record type.
    const TABLE: &'static str;

    /// Converts to a generic row.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a flat object with a string id.
    fn to_row(&self) -> CoreResult<Row> {
        Row::from_value(serde_json::to_value(self)?)
    }

    /// Converts from a generic row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row does not match the type's shape.
    fn from_row(row: &Row) -> CoreResult<Self> {
        Ok(serde_json::from_value(row.to_value())?)
    }
}

/// A typed view over one table of a [`LocalStore`].
///
/// Obtained with [`LocalStore::table`]. Filtering is done with plain
/// closures over the record type.
pub struct TypedTable<'a, T: Record> {
    store: &'a LocalStore,
    _marker: PhantomData<T>,
}

impl LocalStore {
    /// Returns a typed view over `T::TABLE`.
    pub fn table<T: Record>(&self) -> TypedTable<'_, T> {
        TypedTable {
            store: self,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Record> TypedTable<'a, T> {
    /// Returns the table name.
    pub fn name(&self) -> &'static str {
        T::TABLE
    }

    /// Gets a record by id.
    pub fn get(&self, id: &str) -> CoreResult<Option<T>> {
        self.store
            .get_by_id(T::TABLE, id)?
            .as_ref()
            .map(T::from_row)
            .transpose()
    }

    /// Returns every record.
    pub fn all(&self) -> CoreResult<Vec<T>> {
        self.store
            .get_all(T::TABLE)?
            .iter()
            .map(T::from_row)
            .collect()
    }

    /// Returns the records matching `predicate`.
    ///
    /// **Warning**: This decodes and scans the whole table.
    pub fn query(&self, predicate: impl Fn(&T) -> bool) -> CoreResult<Vec<T>> {
        let mut matched = Vec::new();
        for record in self.all()? {
            if predicate(&record) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    /// Inserts a record, returning it as stored.
    pub fn insert(&self, record: &T) -> CoreResult<T> {
        let row = self.store.insert(T::TABLE, record.to_row()?)?;
        T::from_row(&row)
    }

    /// Applies a partial update by id.
    pub fn update(&self, id: &str, partial: &Fields) -> CoreResult<Option<T>> {
        self.store
            .update(T::TABLE, id, partial)?
            .as_ref()
            .map(T::from_row)
            .transpose()
    }

    /// Deletes a record by id.
    pub fn delete(&self, id: &str) -> CoreResult<bool> {
        self.store.delete(T::TABLE, id)
    }

    /// Returns the number of records.
    pub fn count(&self) -> CoreResult<usize> {
        self.store.count(T::TABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::types::Timestamp;
    use ebbtide_storage::InMemoryBlobStore;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: String,
        title: String,
        done: bool,
        #[serde(default)]
        updated_at: Timestamp,
    }

    impl Record for Task {
        const TABLE: &'static str = "tasks";
    }

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            done: false,
            updated_at: Timestamp::EPOCH,
        }
    }

    fn store() -> LocalStore {
        LocalStore::open(
            Arc::new(InMemoryBlobStore::new()),
            StoreConfig::new().with_tables([Task::TABLE]),
        )
        .unwrap()
    }

    #[test]
    fn typed_round_trip() {
        let store = store();
        let tasks = store.table::<Task>();

        let stored = tasks.insert(&task("t1", "pack rope")).unwrap();
        assert_eq!(stored.title, "pack rope");
        assert!(stored.updated_at > Timestamp::EPOCH);

        assert_eq!(tasks.get("t1").unwrap(), Some(stored));
        assert_eq!(tasks.count().unwrap(), 1);
        assert_eq!(tasks.name(), "tasks");
    }

    #[test]
    fn typed_update_and_query() {
        let store = store();
        let tasks = store.table::<Task>();
        tasks.insert(&task("t1", "a")).unwrap();
        tasks.insert(&task("t2", "b")).unwrap();

        let done = tasks
            .update("t2", json!({"done": true}).as_object().unwrap())
            .unwrap()
            .unwrap();
        assert!(done.done);

        let finished = tasks.query(|t| t.done).unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id, "t2");

        assert!(tasks.delete("t1").unwrap());
        assert!(tasks.get("t1").unwrap().is_none());
    }
}

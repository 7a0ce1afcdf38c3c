//! Local store configuration.

/// Default cap on push attempts before a failed outbox entry stops being retried.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Schema entry for one synchronized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name. Also used to derive the table's blob name.
    pub name: String,
    /// Fields that exist only on this device and are stripped before push.
    pub local_only_fields: Vec<String>,
}

impl TableDef {
    /// Creates a table definition with no local-only fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_only_fields: Vec::new(),
        }
    }

    /// Marks a field as local-only.
    #[must_use]
    pub fn local_only(mut self, field: impl Into<String>) -> Self {
        self.local_only_fields.push(field.into());
        self
    }

    /// Returns true if `field` must not leave this device.
    #[must_use]
    pub fn is_local_only(&self, field: &str) -> bool {
        self.local_only_fields.iter().any(|f| f == field)
    }
}

/// Configuration for a [`crate::LocalStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Registered tables, in sync order.
    pub tables: Vec<TableDef>,

    /// Failed outbox entries with `retry_count` at or above this are not retried.
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Re-registering a name replaces the earlier definition.
    #[must_use]
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.retain(|t| t.name != table.name);
        self.tables.push(table);
        self
    }

    /// Registers several plain tables by name.
    #[must_use]
    pub fn with_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.with_table(TableDef::new(name));
        }
        self
    }

    /// Sets the retry cap for failed outbox entries.
    #[must_use]
    pub const fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = value;
        self
    }

    /// Looks up a table definition.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns the registered table names in order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

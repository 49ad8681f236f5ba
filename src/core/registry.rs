//! Purpose: Resolve client-supplied query identifiers to configured SQL statements.
//! Exports: `QueryDefinition`, `QueryRegistry`.
//! Role: Immutable lookup table shared by every request handler.
//! Invariants: Built once before serving; never mutated afterwards.
//! Invariants: Names match case-insensitively; the first definition in load order wins.

use std::collections::HashMap;

use crate::core::config::QueryConfig;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryDefinition {
    pub name: String,
    pub statement: String,
}

#[derive(Debug, Default)]
pub struct QueryRegistry {
    definitions: Vec<QueryDefinition>,
    index: HashMap<String, usize>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl QueryRegistry {
    pub fn from_config(queries: &[QueryConfig]) -> Self {
        Self::from_definitions(queries.iter().map(|query| QueryDefinition {
            name: query.name.clone(),
            statement: query.query.clone(),
        }))
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = QueryDefinition>) -> Self {
        let definitions: Vec<QueryDefinition> = definitions.into_iter().collect();
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            index.entry(normalize(&definition.name)).or_insert(position);
        }
        Self { definitions, index }
    }

    pub fn lookup(&self, id: &str) -> Result<&QueryDefinition, Error> {
        self.index
            .get(&normalize(id))
            .map(|position| &self.definitions[*position])
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("could not find query")
                    .with_query_id(id)
            })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|definition| definition.name.as_str())
    }
}

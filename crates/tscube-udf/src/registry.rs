//! Name → function lookup used by job documents.

use std::collections::BTreeMap;

use crate::builtins::{PassThrough, Reducer, TimeReduce};
use crate::traits::Udf;

pub struct Registry {
    udfs: BTreeMap<String, Box<dyn Udf>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            udfs: BTreeMap::new(),
        }
    }

    /// `identity`, `sum`, `mean`, `min`, `max`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(Box::new(PassThrough));
        for r in [Reducer::Sum, Reducer::Mean, Reducer::Min, Reducer::Max] {
            reg.register(Box::new(TimeReduce::new(r)));
        }
        reg
    }

    /// Add `udf` under its own name, replacing any previous entry.
    pub fn register(&mut self, udf: Box<dyn Udf>) -> Option<Box<dyn Udf>> {
        self.udfs.insert(udf.name().to_string(), udf)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Udf> {
        self.udfs.get(name).map(|b| b.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.udfs.keys().map(String::as_str)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

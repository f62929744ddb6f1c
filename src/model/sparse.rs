use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};

/// A sparse weight vector that never stores explicit zeros
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector<K: Eq + Hash> {
    values: HashMap<K, f64>,
}

impl<K: Eq + Hash> Default for SparseVector<K> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy> SparseVector<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Dot product with an indicator vector over `keys`
    pub fn score<'a, I>(&self, keys: I) -> f64
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().map(|k| self.get(k)).sum()
    }

    pub fn add_to(&mut self, key: K, amount: f64) {
        match self.values.entry(key) {
            Entry::Occupied(mut e) => {
                *e.get_mut() += amount;
                if *e.get() == 0.0 {
                    e.remove();
                }
            }
            Entry::Vacant(e) => {
                if amount != 0.0 {
                    e.insert(amount);
                }
            }
        }
    }

    pub fn increment(&mut self, key: K) {
        self.add_to(key, 1.0);
    }

    pub fn decrement(&mut self, key: K) {
        self.add_to(key, -1.0);
    }

    pub fn add(&mut self, other: &SparseVector<K>) {
        for (&k, &v) in &other.values {
            self.add_to(k, v);
        }
    }

    pub fn subtract(&mut self, other: &SparseVector<K>) {
        for (&k, &v) in &other.values {
            self.add_to(k, -v);
        }
    }

    pub fn scalar_divide(&mut self, divisor: f64) -> Result<()> {
        if divisor == 0.0 {
            return Err(Error::DivideByZero("sparse vector scalar division"));
        }
        for v in self.values.values_mut() {
            *v /= divisor;
        }
        self.values.retain(|_, v| *v != 0.0);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &f64)> + '_ {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Eq + Hash + Copy> FromIterator<(K, f64)> for SparseVector<K> {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut v = Self::new();
        for (k, amount) in iter {
            v.add_to(k, amount);
        }
        v
    }
}

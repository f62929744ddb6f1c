use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Surface form of the artificial ROOT node
pub const ROOT_FORM: &str = "<ROOT>";
/// Part-of-speech tag of the artificial ROOT node
pub const ROOT_POS: &str = "ROOT";

#[derive(Debug, Default, Clone)]
struct Entries {
    /// Map from string to ID
    str_to_id: HashMap<String, u32>,
    /// Map from ID to string
    id_to_str: Vec<String>,
    frozen: bool,
}

impl Entries {
    fn insert(&mut self, s: &str) -> (u32, bool) {
        if let Some(&id) = self.str_to_id.get(s) {
            (id, false)
        } else {
            let id = self.id_to_str.len() as u32;
            self.str_to_id.insert(s.to_string(), id);
            self.id_to_str.push(s.to_string());
            (id, true)
        }
    }
}

/// An append-only bidirectional map between strings and dense integer IDs
///
/// Readers share the set freely; appends take the write lock. A frozen set
/// rejects new values but still answers lookups.
pub struct EnumSet {
    name: &'static str,
    entries: RwLock<Entries>,
}

impl EnumSet {
    /// Create a new empty set
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Rebuild a set from its values in ID order
    pub fn from_values<I, S>(name: &'static str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::new(name);
        {
            let mut entries = set.entries.write();
            for value in values {
                let (_, inserted) = entries.insert(value.as_ref());
                if !inserted {
                    return Err(Error::VocabularyMismatch {
                        set: name,
                        detail: format!("duplicate value {:?}", value.as_ref()),
                    });
                }
            }
        }
        Ok(set)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the number of entries in the set
    pub fn len(&self) -> usize {
        self.entries.read().id_to_str.len()
    }

    /// Returns `true` if the set contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the ID of a value
    pub fn index(&self, s: &str) -> Option<u32> {
        self.entries.read().str_to_id.get(s).copied()
    }

    /// Look up the value of an ID
    pub fn value(&self, id: u32) -> Option<String> {
        self.entries.read().id_to_str.get(id as usize).cloned()
    }

    /// Get or create an ID for a value
    ///
    /// Fails with [`FrozenVocabulary`](Error::FrozenVocabulary) when the
    /// value is new and the set is frozen.
    pub fn add(&self, s: &str) -> Result<u32> {
        if let Some(id) = self.index(s) {
            return Ok(id);
        }
        let mut entries = self.entries.write();
        if let Some(&id) = entries.str_to_id.get(s) {
            return Ok(id);
        }
        if entries.frozen {
            return Err(Error::FrozenVocabulary(self.name));
        }
        Ok(entries.insert(s).0)
    }

    /// Add while the set is open, otherwise only look up
    ///
    /// Used on input data, where unknown values are expected once the
    /// vocabulary has been frozen.
    pub fn resolve(&self, s: &str) -> Option<u32> {
        if let Some(id) = self.index(s) {
            return Some(id);
        }
        let mut entries = self.entries.write();
        if entries.frozen {
            return entries.str_to_id.get(s).copied();
        }
        Some(entries.insert(s).0)
    }

    pub fn freeze(&self) {
        self.entries.write().frozen = true;
    }

    pub fn unfreeze(&self) {
        self.entries.write().frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.entries.read().frozen
    }

    /// Snapshot of all values in ID order
    pub fn values(&self) -> Vec<String> {
        self.entries.read().id_to_str.clone()
    }

    /// Verify that both sets agree on every ID they share
    pub fn check_compatible(&self, other: &EnumSet) -> Result<()> {
        let ours = self.entries.read();
        let theirs = other.entries.read();
        for (id, (a, b)) in ours.id_to_str.iter().zip(&theirs.id_to_str).enumerate() {
            if a != b {
                return Err(Error::VocabularyMismatch {
                    set: self.name,
                    detail: format!("id {} is {:?} here but {:?} in the model", id, a, b),
                });
            }
        }
        Ok(())
    }

    /// Append the values of `other` this set does not have yet
    ///
    /// Both sets must agree on their shared IDs. Appending ignores the
    /// frozen flag, so a frozen session set can adopt a model's entries.
    pub fn extend_from(&self, other: &EnumSet) -> Result<()> {
        self.check_compatible(other)?;
        let theirs = other.values();
        let mut entries = self.entries.write();
        for value in theirs.iter().skip(entries.id_to_str.len()) {
            entries.insert(value);
        }
        Ok(())
    }
}

impl Clone for EnumSet {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: RwLock::new(self.entries.read().clone()),
        }
    }
}

impl fmt::Debug for EnumSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("EnumSet")
            .field("name", &self.name)
            .field("len", &entries.id_to_str.len())
            .field("frozen", &entries.frozen)
            .finish()
    }
}

/// All enumeration sets shared by one parsing session
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub words: EnumSet,
    pub pos: EnumSet,
    pub wpos: EnumSet,
    pub relations: EnumSet,
    pub transitions: EnumSet,
    pub hosts: EnumSet,
    pub suffixes: EnumSet,
    pub spellouts: EnumSet,
    pub features: EnumSet,
}

impl Vocabulary {
    /// Create a vocabulary holding only the ROOT entries
    pub fn new() -> Self {
        let vocab = Self::empty();
        // fresh sets are open, so these cannot fail
        vocab.words.resolve(ROOT_FORM);
        vocab.pos.resolve(ROOT_POS);
        vocab.wpos.resolve(&format!("{}|{}", ROOT_FORM, ROOT_POS));
        vocab
    }

    pub(crate) fn empty() -> Self {
        Self {
            words: EnumSet::new("words"),
            pos: EnumSet::new("pos"),
            wpos: EnumSet::new("wpos"),
            relations: EnumSet::new("relations"),
            transitions: EnumSet::new("transitions"),
            hosts: EnumSet::new("hosts"),
            suffixes: EnumSet::new("suffixes"),
            spellouts: EnumSet::new("spellouts"),
            features: EnumSet::new("features"),
        }
    }

    /// Reassemble a vocabulary from sets in serialization order
    pub(crate) fn from_sets(sets: Vec<EnumSet>) -> Result<Self> {
        let sets: [EnumSet; 9] = sets.try_into().map_err(|sets: Vec<EnumSet>| {
            Error::InvalidModel(format!("expected 9 vocabulary sets, got {}", sets.len()))
        })?;
        let [words, pos, wpos, relations, transitions, hosts, suffixes, spellouts, features] = sets;
        Ok(Self {
            words,
            pos,
            wpos,
            relations,
            transitions,
            hosts,
            suffixes,
            spellouts,
            features,
        })
    }

    /// All sets in their serialization order
    pub fn sets(&self) -> [&EnumSet; 9] {
        [
            &self.words,
            &self.pos,
            &self.wpos,
            &self.relations,
            &self.transitions,
            &self.hosts,
            &self.suffixes,
            &self.spellouts,
            &self.features,
        ]
    }

    /// Freeze for decoding
    ///
    /// Spellouts and transitions stay open: lattice paths never seen in
    /// training still need an MD transition.
    pub fn freeze(&self) {
        for set in self.sets() {
            set.freeze();
        }
        self.spellouts.unfreeze();
        self.transitions.unfreeze();
    }

    /// Open the sets that training extends
    ///
    /// Relations stay frozen: the transition space was laid out over them.
    pub fn unfreeze_for_training(&self) {
        for set in self.sets() {
            set.unfreeze();
        }
        self.relations.freeze();
    }

    /// Verify that `other` agrees with this vocabulary on every shared ID
    pub fn check_compatible(&self, other: &Vocabulary) -> Result<()> {
        for (ours, theirs) in self.sets().iter().zip(other.sets().iter()) {
            ours.check_compatible(theirs)?;
        }
        Ok(())
    }

    /// Adopt every entry of `other` after checking compatibility
    ///
    /// Nothing is appended unless all sets agree.
    pub fn extend_from(&self, other: &Vocabulary) -> Result<()> {
        self.check_compatible(other)?;
        for (ours, theirs) in self.sets().iter().zip(other.sets().iter()) {
            ours.extend_from(theirs)?;
        }
        Ok(())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

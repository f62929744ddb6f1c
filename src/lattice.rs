//! Morphological lattices
//!
//! A lattice is a small DAG whose edges are morphemes. Every path from the
//! bottom vertex to the top vertex is one possible spellout of the surface
//! token.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A lattice edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Morpheme {
    pub from: usize,
    pub to: usize,
    pub form: String,
    pub cpos: String,
    pub pos: String,
    /// Parsed `key=value` features
    #[serde(default)]
    pub features: BTreeMap<String, String>,
    /// Index of the surface token the morpheme belongs to
    #[serde(default)]
    pub token_id: usize,
    /// Raw feature string, `_` when empty
    #[serde(default)]
    pub feature_str: String,
}

impl Morpheme {
    pub fn new(from: usize, to: usize, form: &str, cpos: &str, pos: &str, feature_str: &str) -> Self {
        let features = feature_str
            .split('|')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let feature_str = if feature_str.is_empty() {
            "_".to_string()
        } else {
            feature_str.to_string()
        };
        Self {
            from,
            to,
            form: form.to_string(),
            cpos: cpos.to_string(),
            pos: pos.to_string(),
            features,
            token_id: 0,
            feature_str,
        }
    }
}

/// Morphemes compare by content, not by their position in a lattice
impl PartialEq for Morpheme {
    fn eq(&self, other: &Self) -> bool {
        self.form == other.form
            && self.cpos == other.cpos
            && self.pos == other.pos
            && self.features == other.features
    }
}

impl Eq for Morpheme {}

impl fmt::Display for Morpheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.form, self.cpos, self.pos, self.feature_str)
    }
}

/// One complete path through a lattice
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Spellout(pub Vec<Morpheme>);

impl Spellout {
    /// Canonical string, also used as the MD transition key
    pub fn as_string(&self) -> String {
        self.0
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn morphemes(&self) -> &[Morpheme] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Spellout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.0.iter().map(|m| m.cpos.as_str()).collect();
        write!(f, "{}", tags.join(":"))
    }
}

/// The view of a morpheme that names MD transitions
///
/// Coarser views let one transition cover spellouts that were never seen in
/// training, such as an unknown noun with a known tag sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MdParam {
    /// Form, CPOS, POS and features
    #[default]
    Full,
    Form,
    FormProp,
    Pos,
    PosProp,
    FormPos,
    FormPosProp,
    /// CPOS alone for open classes, form and CPOS otherwise
    FuncsMainPos,
    /// As `FuncsMainPos`, both sides keeping the features
    FuncsMainPosProp,
}

/// Projects spellouts to MD transition keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpelloutProjection {
    param: MdParam,
    /// Open class CPOS tags for the `Funcs*` parameters
    main_pos: BTreeSet<String>,
}

impl SpelloutProjection {
    pub fn new<I, S>(param: MdParam, main_pos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            param,
            main_pos: main_pos.into_iter().map(Into::into).collect(),
        }
    }

    pub fn param(&self) -> MdParam {
        self.param
    }

    fn morpheme(&self, m: &Morpheme) -> String {
        let open = self.main_pos.contains(&m.cpos);
        match self.param {
            MdParam::Full => m.to_string(),
            MdParam::Form => m.form.clone(),
            MdParam::FormProp => format!("{}_{}", m.form, m.feature_str),
            MdParam::Pos => m.cpos.clone(),
            MdParam::PosProp => format!("{}_{}", m.cpos, m.feature_str),
            MdParam::FormPos => format!("{}_{}", m.form, m.cpos),
            MdParam::FormPosProp => format!("{}_{}_{}", m.form, m.cpos, m.feature_str),
            MdParam::FuncsMainPos if open => m.cpos.clone(),
            MdParam::FuncsMainPos => format!("{}_{}", m.form, m.cpos),
            MdParam::FuncsMainPosProp if open => format!("{}_{}", m.cpos, m.feature_str),
            MdParam::FuncsMainPosProp => format!("{}_{}_{}", m.form, m.cpos, m.feature_str),
        }
    }

    /// The MD key of a spellout, one projected morpheme per `;` field
    pub fn project(&self, spellout: &Spellout) -> String {
        spellout
            .morphemes()
            .iter()
            .map(|m| self.morpheme(m))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// A committed token to spellout decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub token: String,
    pub spellout: Spellout,
}

/// All segmentation alternatives of one surface token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    pub token: String,
    pub morphemes: Vec<Morpheme>,
    /// Outgoing morpheme indices per vertex
    next: HashMap<usize, Vec<usize>>,
    bottom: usize,
    top: usize,
    spellouts: Vec<Spellout>,
}

impl Lattice {
    /// Build a lattice and enumerate its spellouts
    pub fn new<S: Into<String>>(token: S, mut morphemes: Vec<Morpheme>) -> Result<Self> {
        let token = token.into();
        if morphemes.is_empty() {
            return Err(Error::invalid_input(format!(
                "lattice for {:?} has no morphemes",
                token
            )));
        }
        morphemes.sort_by_key(|m| (m.from, m.to));
        let bottom = morphemes.iter().map(|m| m.from).min().unwrap_or(0);
        let top = morphemes.iter().map(|m| m.to).max().unwrap_or(0);
        let mut lattice = Self {
            token,
            morphemes,
            next: HashMap::new(),
            bottom,
            top,
            spellouts: Vec::new(),
        };
        lattice.index_edges();
        lattice.gen_spellouts();
        Ok(lattice)
    }

    fn index_edges(&mut self) {
        self.next.clear();
        for (i, m) in self.morphemes.iter().enumerate() {
            self.next.entry(m.from).or_default().push(i);
        }
    }

    /// Enumerate every bottom to top path, sorted by canonical string
    pub fn gen_spellouts(&mut self) {
        let mut spellouts = Vec::new();
        let mut path = Vec::new();
        self.walk(self.bottom, &mut path, &mut spellouts);
        spellouts.sort_by_cached_key(|s: &Spellout| s.as_string());
        spellouts.dedup();
        self.spellouts = spellouts;
    }

    fn walk(&self, vertex: usize, path: &mut Vec<usize>, out: &mut Vec<Spellout>) {
        if vertex == self.top {
            if !path.is_empty() {
                out.push(Spellout(
                    path.iter().map(|&i| self.morphemes[i].clone()).collect(),
                ));
            }
            return;
        }
        if let Some(edges) = self.next.get(&vertex) {
            for &i in edges {
                // edges never point backwards, so the walk terminates
                if self.morphemes[i].to <= vertex {
                    continue;
                }
                path.push(i);
                self.walk(self.morphemes[i].to, path, out);
                path.pop();
            }
        }
    }

    pub fn spellouts(&self) -> &[Spellout] {
        &self.spellouts
    }

    pub fn bottom(&self) -> usize {
        self.bottom
    }

    pub fn top(&self) -> usize {
        self.top
    }

    /// Find a spellout by its canonical string
    pub fn find_spellout(&self, key: &str) -> Option<usize> {
        self.spellouts.iter().position(|s| s.as_string() == key)
    }

    /// The first spellout whose projection is `key`
    pub fn find_projected(&self, key: &str, projection: &SpelloutProjection) -> Option<usize> {
        self.spellouts
            .iter()
            .position(|s| projection.project(s) == key)
    }

    /// Close one-vertex gaps left by morphemes that end where no edge starts
    pub fn bridge_missing_morphemes(&mut self) {
        let mut changed = false;
        for i in 0..self.morphemes.len() {
            let to = self.morphemes[i].to;
            if to < self.top && !self.next.contains_key(&to) {
                if self.next.contains_key(&(to + 1)) {
                    warn!(
                        "bridging morpheme {} from {} to {}",
                        self.morphemes[i].form,
                        to,
                        to + 1
                    );
                    self.morphemes[i].to += 1;
                    changed = true;
                } else {
                    warn!(
                        "cannot bridge morpheme {} ({}, {})",
                        self.morphemes[i].form, self.morphemes[i].from, to
                    );
                }
            }
        }
        if changed {
            self.gen_spellouts();
        }
    }

    /// Add a spellout path that the analyzer missed
    ///
    /// Returns `false` when the lattice already held an equal path.
    pub fn add_spellout(&mut self, spellout: Spellout) -> bool {
        if self.spellouts.contains(&spellout) {
            return false;
        }
        for m in spellout.morphemes() {
            if !self.morphemes.iter().any(|own| own == m && own.from == m.from && own.to == m.to) {
                self.morphemes.push(m.clone());
            }
        }
        self.index_edges();
        self.spellouts.push(spellout);
        self.spellouts.sort_by_cached_key(|s| s.as_string());
        true
    }
}

/// One lattice per surface token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatticeSentence(pub Vec<Lattice>);

impl LatticeSentence {
    pub fn new(lattices: Vec<Lattice>) -> Self {
        Self(lattices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lattices(&self) -> &[Lattice] {
        &self.0
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.0.iter().map(|l| l.token.as_str()).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// "bbit": either one noun, or a preposition, a determiner and a noun
    pub(crate) fn ambiguous_lattice() -> Lattice {
        Lattice::new(
            "bbit",
            vec![
                Morpheme::new(0, 1, "b", "PREP", "PREP", ""),
                Morpheme::new(1, 2, "h", "DEF", "DEF", ""),
                Morpheme::new(2, 3, "bit", "NN", "NN", "gen=M"),
                Morpheme::new(1, 3, "bit", "NN", "NN", "gen=M"),
                Morpheme::new(0, 3, "bbit", "NN", "NN", "gen=M"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_spellouts_enumerated_and_sorted() {
        let lattice = ambiguous_lattice();
        let keys: Vec<String> = lattice.spellouts().iter().map(|s| s.as_string()).collect();
        assert_eq!(keys.len(), 3);
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"bbit-NN-NN-gen=M".to_string()));
        assert!(keys.contains(&"b-PREP-PREP-_;h-DEF-DEF-_;bit-NN-NN-gen=M".to_string()));
    }

    #[test]
    fn test_find_spellout() {
        let lattice = ambiguous_lattice();
        let idx = lattice.find_spellout("b-PREP-PREP-_;bit-NN-NN-gen=M").unwrap();
        assert_eq!(lattice.spellouts()[idx].len(), 2);
        assert_eq!(lattice.find_spellout("nothing"), None);
    }

    #[test]
    fn test_spellout_projections() {
        let lattice = ambiguous_lattice();
        let pos = SpelloutProjection::new(MdParam::Pos, Vec::<String>::new());
        let keys: Vec<String> = lattice.spellouts().iter().map(|s| pos.project(s)).collect();
        assert_eq!(keys, vec!["PREP;NN", "PREP;DEF;NN", "NN"]);

        let full = SpelloutProjection::default();
        let bbit = &lattice.spellouts()[2];
        assert_eq!(full.project(bbit), bbit.as_string());

        let funcs = SpelloutProjection::new(MdParam::FuncsMainPosProp, ["NN"]);
        assert_eq!(
            funcs.project(&lattice.spellouts()[1]),
            "b_PREP__;h_DEF__;NN_gen=M"
        );

        // an unseen noun falls under the key of a known one
        let unseen = Lattice::new(
            "bsfr",
            vec![
                Morpheme::new(0, 1, "b", "PREP", "PREP", ""),
                Morpheme::new(1, 2, "sfr", "NN", "NN", "gen=M"),
            ],
        )
        .unwrap();
        let known = &lattice.spellouts()[0];
        assert_eq!(unseen.find_spellout(&known.as_string()), None);
        assert_eq!(unseen.find_projected(&funcs.project(known), &funcs), Some(0));
    }

    #[test]
    fn test_morpheme_equality_ignores_vertices() {
        let a = Morpheme::new(0, 1, "b", "PREP", "PREP", "");
        let b = Morpheme::new(4, 5, "b", "PREP", "PREP", "_");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "b-PREP-PREP-_");
    }

    #[test]
    fn test_bridge_missing_morphemes() {
        let mut lattice = Lattice::new(
            "ab",
            vec![
                Morpheme::new(0, 1, "a", "NN", "NN", ""),
                Morpheme::new(2, 3, "b", "NN", "NN", ""),
            ],
        )
        .unwrap();
        assert!(lattice.spellouts().is_empty());
        lattice.bridge_missing_morphemes();
        assert_eq!(lattice.spellouts().len(), 1);
        assert_eq!(lattice.spellouts()[0].len(), 2);
    }

    #[test]
    fn test_add_spellout() {
        let mut lattice = ambiguous_lattice();
        let extra = Spellout(vec![Morpheme::new(0, 3, "bbit", "VB", "VB", "")]);
        assert!(lattice.add_spellout(extra.clone()));
        assert!(!lattice.add_spellout(extra));
        assert_eq!(lattice.spellouts().len(), 4);
    }

    #[test]
    fn test_empty_lattice_rejected() {
        assert!(Lattice::new("x", Vec::new()).is_err());
    }
}

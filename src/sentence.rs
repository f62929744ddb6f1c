use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::lattice::LatticeSentence;
use crate::vocabulary::{Vocabulary, ROOT_FORM, ROOT_POS};

/// A surface token with its part-of-speech tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedToken {
    pub form: String,
    pub pos: String,
    #[serde(default)]
    pub lemma: Option<String>,
    /// Morphological host, when the token was split off a larger word
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl TaggedToken {
    pub fn new<F: Into<String>, P: Into<String>>(form: F, pos: P) -> Self {
        Self {
            form: form.into(),
            pos: pos.into(),
            lemma: None,
            host: None,
            suffix: None,
        }
    }

    pub fn with_morph<H: Into<String>, S: Into<String>>(mut self, host: H, suffix: S) -> Self {
        self.host = Some(host.into());
        self.suffix = Some(suffix.into());
        self
    }

    pub(crate) fn root() -> Self {
        Self::new(ROOT_FORM, ROOT_POS)
    }

    /// Combined word and tag key
    pub fn wpos(&self) -> String {
        format!("{}|{}", self.form, self.pos)
    }
}

impl<F: Into<String>, P: Into<String>> From<(F, P)> for TaggedToken {
    fn from((form, pos): (F, P)) -> Self {
        Self::new(form, pos)
    }
}

/// A sequence of tagged tokens, without the ROOT node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSentence(pub Vec<TaggedToken>);

impl TaggedSentence {
    pub fn new(tokens: Vec<TaggedToken>) -> Self {
        Self(tokens)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[TaggedToken] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedToken> + '_ {
        self.0.iter()
    }
}

impl<T: Into<TaggedToken>> FromIterator<T> for TaggedSentence {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Index<usize> for TaggedSentence {
    type Output = TaggedToken;

    fn index(&self, index: usize) -> &TaggedToken {
        &self.0[index]
    }
}

/// A parser node: a token together with its enumerated IDs
///
/// IDs are `None` for values the frozen vocabulary has never seen.
#[derive(Debug, Clone, PartialEq)]
pub struct DepNode {
    pub token: TaggedToken,
    /// Coarse tag, set on nodes created from morphemes
    pub cpos: Option<String>,
    /// Morphological feature string, set on nodes created from morphemes
    pub features: Option<String>,
    pub word: Option<u32>,
    pub pos: Option<u32>,
    pub wpos: Option<u32>,
    pub cpos_id: Option<u32>,
    pub host: Option<u32>,
    pub suffix: Option<u32>,
}

impl DepNode {
    /// Enumerate a token against the vocabulary
    pub fn resolve(token: TaggedToken, vocab: &Vocabulary) -> Self {
        let word = vocab.words.resolve(&token.form);
        let pos = vocab.pos.resolve(&token.pos);
        let wpos = vocab.wpos.resolve(&token.wpos());
        let host = token.host.as_deref().and_then(|h| vocab.hosts.resolve(h));
        let suffix = token
            .suffix
            .as_deref()
            .and_then(|s| vocab.suffixes.resolve(s));
        Self {
            token,
            cpos: None,
            features: None,
            word,
            pos,
            wpos,
            cpos_id: None,
            host,
            suffix,
        }
    }

    pub(crate) fn root(vocab: &Vocabulary) -> Self {
        Self::resolve(TaggedToken::root(), vocab)
    }

    pub(crate) fn with_morph_tags(mut self, cpos: &str, features: &str, vocab: &Vocabulary) -> Self {
        self.cpos_id = vocab.pos.resolve(cpos);
        self.cpos = Some(cpos.to_string());
        self.features = Some(features.to_string());
        self
    }
}

/// A tagged sentence enumerated against a vocabulary, ROOT at index 0
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTaggedSentence {
    pub nodes: Vec<DepNode>,
}

impl EnumTaggedSentence {
    pub fn from_tagged(sentence: &TaggedSentence, vocab: &Vocabulary) -> Self {
        let mut nodes = Vec::with_capacity(sentence.len() + 1);
        nodes.push(DepNode::root(vocab));
        nodes.extend(
            sentence
                .iter()
                .map(|token| DepNode::resolve(token.clone(), vocab)),
        );
        Self { nodes }
    }

    /// Number of nodes including ROOT
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Input to a transition system
#[derive(Debug, Clone)]
pub enum ParseInput {
    /// Tokens for plain dependency parsing
    Tagged(TaggedSentence),
    /// Ambiguous lattices for morphological or joint parsing
    Lattices(LatticeSentence),
}

impl ParseInput {
    /// Number of surface tokens
    pub fn len(&self) -> usize {
        match self {
            ParseInput::Tagged(sent) => sent.len(),
            ParseInput::Lattices(lattices) => lattices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<TaggedSentence> for ParseInput {
    fn from(sent: TaggedSentence) -> Self {
        ParseInput::Tagged(sent)
    }
}

impl From<LatticeSentence> for ParseInput {
    fn from(lattices: LatticeSentence) -> Self {
        ParseInput::Lattices(lattices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_sentence_from_pairs() {
        let sent: TaggedSentence = vec![("Economic", "NN"), ("news", "NN")]
            .into_iter()
            .collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].form, "news");
        assert_eq!(sent[0].wpos(), "Economic|NN");
    }

    #[test]
    fn test_enumerate_adds_root() {
        let vocab = Vocabulary::new();
        let sent: TaggedSentence = vec![("had", "VB")].into_iter().collect();
        let enumerated = EnumTaggedSentence::from_tagged(&sent, &vocab);
        assert_eq!(enumerated.len(), 2);
        assert_eq!(enumerated.nodes[0].token.form, ROOT_FORM);
        assert_eq!(enumerated.nodes[0].word, Some(0));
        assert_eq!(enumerated.nodes[1].word, vocab.words.index("had"));
    }

    #[test]
    fn test_unknown_words_after_freeze() {
        let vocab = Vocabulary::new();
        vocab.freeze();
        let node = DepNode::resolve(TaggedToken::new("unseen", "NN"), &vocab);
        assert_eq!(node.word, None);
        assert_eq!(node.pos, None);
        assert_eq!(node.host, None);
    }
}

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transition::{Family, TransitionFamilies};

use super::address::{Address, Attribute};

/// One `address|attr|attr` part of a template
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub address: Address,
    pub attributes: Vec<Attribute>,
}

/// A compiled feature template
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTemplate {
    pub text: String,
    pub elements: Vec<Element>,
    /// Addresses that must resolve for the template to fire
    pub requirements: Vec<Address>,
    pub families: TransitionFamilies,
}

fn invalid(template: &str, reason: impl Into<String>) -> Error {
    Error::InvalidTemplate {
        template: template.to_string(),
        reason: reason.into(),
    }
}

impl FeatureTemplate {
    /// Parse `S0|w+N0|p` style text with optional `req1;req2` requirements
    pub fn parse(text: &str, requirements: Option<&str>, families: TransitionFamilies) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(invalid(text, "empty template"));
        }
        let mut elements = Vec::new();
        for part in text.split('+') {
            // word and POS together are a single attribute
            let part = part.replace("w|p", "wp");
            let mut fields = part.split('|');
            let address = fields
                .next()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| invalid(text, format!("element {:?} has no address", part)))?
                .parse::<Address>()
                .map_err(|e| invalid(text, e))?;
            let attributes = fields
                .map(|a| a.parse::<Attribute>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| invalid(text, e))?;
            if attributes.is_empty() {
                return Err(invalid(text, format!("element {:?} has no attribute", part)));
            }
            elements.push(Element {
                address,
                attributes,
            });
        }
        let requirements = match requirements.map(str::trim) {
            None | Some("") | Some("n/a") => Vec::new(),
            Some(reqs) => reqs
                .split(';')
                .map(|r| r.trim().parse::<Address>().map_err(|e| invalid(text, e)))
                .collect::<Result<Vec<_>>>()?,
        };
        if families.is_empty() {
            return Err(invalid(text, "template fires for no transition family"));
        }
        Ok(Self {
            text: text.to_string(),
            elements,
            requirements,
            families,
        })
    }

    pub fn fires_for(&self, family: Family) -> bool {
        self.families.contains(family.flag())
    }
}

/// A template as written in a feature setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    pub families: Vec<Family>,
}

/// Feature templates grouped by transition family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSetup {
    pub templates: Vec<TemplateSpec>,
}

const DEFAULT_ARC: &[&str] = &[
    "S0|w",
    "S0|p",
    "S0|wp",
    "N0|w",
    "N0|p",
    "N0|wp",
    "N1|w",
    "N1|p",
    "N1|wp",
    "N2|p",
    "S0|wp+N0|wp",
    "S0|wp+N0|w",
    "S0|w+N0|wp",
    "S0|wp+N0|p",
    "S0|p+N0|wp",
    "S0|w+N0|w",
    "S0|p+N0|p",
    "N0|p+N1|p",
    "N0|p+N1|p+N2|p",
    "S0|p+N0|p+N1|p",
    "S0h|p+S0|p+N0|p",
    "S0|p+S0l|p+N0|p",
    "S0|p+S0r|p+N0|p",
    "S0|p+N0|p+N0l|p",
    "S0|w+S0|d",
    "S0|p+S0|d",
    "N0|w+S0|d",
    "S0|p+N0|p+S0|d",
    "S0|w+S0|vr",
    "S0|p+S0|vr",
    "S0|w+S0|vl",
    "S0|p+S0|vl",
    "N0|w+N0|vl",
    "N0|p+N0|vl",
    "S0h|w",
    "S0h|p",
    "S0|l",
    "S0l|w",
    "S0l|p",
    "S0l|l",
    "S0r|w",
    "S0r|p",
    "S0r|l",
    "N0l|w",
    "N0l|p",
    "N0l|l",
    "S0h2|w",
    "S0h2|p",
    "S0h|l",
    "S0l2|w",
    "S0l2|p",
    "S0l2|l",
    "S0r2|w",
    "S0r2|p",
    "S0r2|l",
    "N0l2|w",
    "N0l2|p",
    "N0l2|l",
    "S0|p+S0l|p+S0l2|p",
    "S0|p+S0r|p+S0r2|p",
    "S0|p+S0h|p+S0h2|p",
    "N0|p+N0l|p+N0l2|p",
    "S0|w+S0|sr",
    "S0|p+S0|sr",
    "S0|w+S0|sl",
    "S0|p+S0|sl",
    "N0|w+N0|sl",
    "N0|p+N0|sl",
    "S0|p+S0Ci|l",
    "S0|o+N0|p",
];

const DEFAULT_MORPH: &[&str] = &[
    "L0|t",
    "L0|n",
    "L0|t+L0|n",
    "L1|t",
    "L0|t+L1|t",
    "M0|f",
    "M0|c",
    "M0|g",
    "M0|c+M0|g",
    "M0|f+L0|t",
    "M0|c+L0|t",
    "M1|c+M0|c",
    "M1|c+M0|c+L0|t",
    "N0|p+L0|t",
];

const DEFAULT_IDLE: &[&str] = &["S0|p", "N0|p", "M0|c"];

impl FeatureSetup {
    fn from_templates(templates: &[&str], family: Family) -> Self {
        Self {
            templates: templates
                .iter()
                .map(|t| TemplateSpec {
                    template: t.to_string(),
                    requirements: None,
                    families: vec![family],
                })
                .collect(),
        }
    }

    /// Templates over words, tags, arcs and valency
    pub fn default_arc() -> Self {
        Self::from_templates(DEFAULT_ARC, Family::Arc)
    }

    /// Templates over lattices and committed morphemes
    pub fn default_morph() -> Self {
        Self::from_templates(DEFAULT_MORPH, Family::Morph)
    }

    pub fn default_idle() -> Self {
        Self::from_templates(DEFAULT_IDLE, Family::Idle)
    }

    pub fn extend(&mut self, other: FeatureSetup) {
        self.templates.extend(other.templates);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Parse the line format
    ///
    /// ```text
    /// # comment
    /// [arc]
    /// S0|w+N0|w
    /// S0h|p,S0h
    /// [morph]
    /// L0|t
    /// ```
    pub fn parse_lines(text: &str) -> Result<Self> {
        let mut family = Family::Arc;
        let mut templates = Vec::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                family = match section.trim() {
                    "arc" => Family::Arc,
                    "morph" => Family::Morph,
                    "idle" => Family::Idle,
                    other => return Err(invalid(line, format!("unknown section {:?}", other))),
                };
                continue;
            }
            let (template, requirements) = match line.split_once(',') {
                Some((t, r)) => (t.trim(), Some(r.trim().to_string())),
                None => (line, None),
            };
            templates.push(TemplateSpec {
                template: template.to_string(),
                requirements,
                families: vec![family],
            });
        }
        Ok(Self { templates })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a setup, as JSON when the file ends in `.json` and in the line
    /// format otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        if path.extension().map_or(false, |e| e == "json") {
            Self::from_json_str(&text)
        } else {
            Self::parse_lines(&text)
        }
    }

    pub fn compile(&self) -> Result<Vec<FeatureTemplate>> {
        self.templates
            .iter()
            .map(|spec| {
                let families = spec
                    .families
                    .iter()
                    .fold(TransitionFamilies::empty(), |acc, f| acc | f.flag());
                FeatureTemplate::parse(&spec.template, spec.requirements.as_deref(), families)
            })
            .collect()
    }
}

/// Arc, morph and idle defaults together
impl Default for FeatureSetup {
    fn default() -> Self {
        let mut setup = Self::default_arc();
        setup.extend(Self::default_morph());
        setup.extend(Self::default_idle());
        setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::address::{Source, Step};

    #[test]
    fn test_parse_template() {
        let t = FeatureTemplate::parse("S0h|w|p+N0|l", Some("S0h;N0"), TransitionFamilies::ARC)
            .unwrap();
        assert_eq!(t.elements.len(), 2);
        assert_eq!(t.elements[0].address.step, Some(Step::Head));
        assert_eq!(t.elements[0].attributes, vec![Attribute::WordPos]);
        assert_eq!(t.elements[1].attributes, vec![Attribute::Label]);
        assert_eq!(t.requirements.len(), 2);
        assert_eq!(t.requirements[1].source, Source::Queue);
        assert!(t.fires_for(Family::Arc));
        assert!(!t.fires_for(Family::Morph));

        let t = FeatureTemplate::parse("S0|p|l", Some("n/a"), TransitionFamilies::ALL).unwrap();
        assert_eq!(t.elements[0].attributes, vec![Attribute::Pos, Attribute::Label]);
        assert!(t.requirements.is_empty());
    }

    #[test]
    fn test_invalid_templates() {
        for text in ["", "S0", "S0|q", "Q0|w", "S0|w+", "|w"] {
            assert!(
                matches!(
                    FeatureTemplate::parse(text, None, TransitionFamilies::ARC),
                    Err(Error::InvalidTemplate { .. })
                ),
                "{:?} should be rejected",
                text
            );
        }
        assert!(FeatureTemplate::parse("S0|w", None, TransitionFamilies::empty()).is_err());
    }

    #[test]
    fn test_line_format() {
        let text = "# comment\nS0|w+N0|w\n\n[morph]\nL0|t # trailing\n[idle]\nS0|p,S0\n";
        let setup = FeatureSetup::parse_lines(text).unwrap();
        assert_eq!(setup.len(), 3);
        assert_eq!(setup.templates[0].families, vec![Family::Arc]);
        assert_eq!(setup.templates[1].template, "L0|t");
        assert_eq!(setup.templates[1].families, vec![Family::Morph]);
        assert_eq!(setup.templates[2].requirements.as_deref(), Some("S0"));
        assert!(FeatureSetup::parse_lines("[tags]\nS0|w").is_err());
    }

    #[test]
    fn test_json_setup() {
        let json = r#"{"templates": [{"template": "S0|w", "families": ["arc", "idle"]}]}"#;
        let setup = FeatureSetup::from_json_str(json).unwrap();
        let compiled = setup.compile().unwrap();
        assert_eq!(
            compiled[0].families,
            TransitionFamilies::ARC | TransitionFamilies::IDLE
        );
        let back = FeatureSetup::from_json_str(&setup.to_json().unwrap()).unwrap();
        assert_eq!(back, setup);
    }

    #[test]
    fn test_default_setups_compile() {
        let setup = FeatureSetup::default();
        let compiled = setup.compile().unwrap();
        assert_eq!(
            compiled.len(),
            DEFAULT_ARC.len() + DEFAULT_MORPH.len() + DEFAULT_IDLE.len()
        );
        assert!(compiled.iter().any(|t| t.elements.iter().any(|e| e.address.is_generator())));
    }

    #[test]
    fn test_setup_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.txt");
        fs::write(&path, "S0|w\n[morph]\nM0|f\n").unwrap();
        let setup = FeatureSetup::from_file(&path).unwrap();
        assert_eq!(setup.len(), 2);

        let json_path = dir.path().join("features.json");
        fs::write(&json_path, setup.to_json().unwrap()).unwrap();
        assert_eq!(FeatureSetup::from_file(&json_path).unwrap(), setup);
    }
}

//! # Key Mapping Module
//!
//! Translates committed notes into keyboard actions. A closed set of named
//! schemes is available; `custom` starts from a built-in layout and can be
//! edited note by note.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::tuning::{Note, REFERENCE_NOTES};

/// What the injection collaborator should produce for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum KeyAction {
    /// Type a printable character.
    Char(char),
    Space,
    Enter,
    Backspace,
}

impl KeyAction {
    /// Text equivalent of the action, as typed into a terminal.
    pub fn as_text(&self) -> String {
        match self {
            KeyAction::Char(c) => c.to_string(),
            KeyAction::Space => " ".to_string(),
            KeyAction::Enter => "\n".to_string(),
            KeyAction::Backspace => "\u{8}".to_string(),
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Char(c) => write!(f, "{}", c),
            KeyAction::Space => f.write_str("SPACE"),
            KeyAction::Enter => f.write_str("ENTER"),
            KeyAction::Backspace => f.write_str("BACKSPACE"),
        }
    }
}

impl FromStr for KeyAction {
    type Err = ConfigError;

    /// Accepts a single character or one of the named keys
    /// (`space`, `enter`/`return`, `backspace`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "space" | " " => return Ok(KeyAction::Space),
            "enter" | "return" | "\n" => return Ok(KeyAction::Enter),
            "backspace" => return Ok(KeyAction::Backspace),
            _ => {}
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() => Ok(KeyAction::Char(c)),
            _ => Err(ConfigError::InvalidKey(s.to_string())),
        }
    }
}

/// Named note → key layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingScheme {
    /// Each string types its own letter name.
    Letters,
    /// Strings number 1-6 from low to high.
    Numbers,
    /// Positional: strings map onto the top letter row (q w e r t y).
    Qwerty,
    /// User-editable layout.
    Custom,
}

impl MappingScheme {
    pub const ALL: [MappingScheme; 4] = [
        MappingScheme::Letters,
        MappingScheme::Numbers,
        MappingScheme::Qwerty,
        MappingScheme::Custom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MappingScheme::Letters => "letters",
            MappingScheme::Numbers => "numbers",
            MappingScheme::Qwerty => "qwerty",
            MappingScheme::Custom => "custom",
        }
    }

    /// Built-in table in reference-note order (E2 A2 D3 G3 B3 E4).
    fn default_actions(&self) -> [KeyAction; 6] {
        use KeyAction::*;
        match self {
            MappingScheme::Letters => [
                Char('e'),
                Char('a'),
                Char('d'),
                Char('g'),
                Char('b'),
                Char('E'),
            ],
            MappingScheme::Numbers => [
                Char('1'),
                Char('2'),
                Char('3'),
                Char('4'),
                Char('5'),
                Char('6'),
            ],
            MappingScheme::Qwerty => [
                Char('q'),
                Char('w'),
                Char('e'),
                Char('r'),
                Char('t'),
                Char('y'),
            ],
            MappingScheme::Custom => [Space, Char('a'), Char('s'), Char('d'), Char('f'), Enter],
        }
    }

    fn default_table(&self) -> BTreeMap<&'static str, KeyAction> {
        REFERENCE_NOTES
            .iter()
            .zip(self.default_actions())
            .map(|(note, action)| (note.name, action))
            .collect()
    }
}

impl fmt::Display for MappingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MappingScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MappingScheme::ALL
            .into_iter()
            .find(|scheme| scheme.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownScheme(s.to_string()))
    }
}

/// Parses a `NOTE=KEY` mapping such as `E2=backspace` or `a2=x`.
pub fn parse_mapping(spec: &str) -> Result<(Note, KeyAction), ConfigError> {
    let (note, key) = spec
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidMapping(spec.to_string()))?;
    let note: Note = note.parse()?;
    let key = if key.is_empty() {
        return Err(ConfigError::InvalidMapping(spec.to_string()));
    } else {
        key.parse()?
    };
    Ok((note, key))
}

/// Active scheme plus the editable custom table.
#[derive(Debug, Clone)]
pub struct KeyMapper {
    current: MappingScheme,
    custom: BTreeMap<&'static str, KeyAction>,
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new(MappingScheme::Letters)
    }
}

impl KeyMapper {
    pub fn new(scheme: MappingScheme) -> Self {
        Self {
            current: scheme,
            custom: MappingScheme::Custom.default_table(),
        }
    }

    /// Selects a scheme by name. Unknown names are an error and leave the
    /// current scheme untouched.
    pub fn set_scheme(&mut self, name: &str) -> Result<MappingScheme, ConfigError> {
        let scheme: MappingScheme = name.parse()?;
        self.current = scheme;
        log::info!("Mapping scheme changed to: {}", scheme);
        Ok(scheme)
    }

    pub fn current_scheme(&self) -> MappingScheme {
        self.current
    }

    pub fn available_schemes(&self) -> Vec<&'static str> {
        MappingScheme::ALL.iter().map(|s| s.name()).collect()
    }

    /// Overrides one entry of the custom scheme.
    pub fn add_custom_mapping(&mut self, note: Note, action: KeyAction) {
        self.custom.insert(note.name, action);
    }

    pub fn key_for(&self, note: &Note) -> Option<KeyAction> {
        match self.current {
            MappingScheme::Custom => self.custom.get(note.name).copied(),
            scheme => scheme.default_table().get(note.name).copied(),
        }
    }

    /// Current mappings in reference-note order, for display.
    pub fn mappings(&self) -> Vec<(Note, KeyAction)> {
        REFERENCE_NOTES
            .iter()
            .filter_map(|note| self.key_for(note).map(|action| (*note, action)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(name: &str) -> Note {
        name.parse().unwrap()
    }

    #[test]
    fn same_note_differs_between_schemes() {
        let mut mapper = KeyMapper::default();
        assert_eq!(mapper.key_for(&note("A2")), Some(KeyAction::Char('a')));
        mapper.set_scheme("numbers").unwrap();
        assert_eq!(mapper.key_for(&note("A2")), Some(KeyAction::Char('2')));
        mapper.set_scheme("qwerty").unwrap();
        assert_eq!(mapper.key_for(&note("A2")), Some(KeyAction::Char('w')));
        mapper.set_scheme("custom").unwrap();
        assert_eq!(mapper.key_for(&note("E2")), Some(KeyAction::Space));
        assert_eq!(mapper.key_for(&note("E4")), Some(KeyAction::Enter));
    }

    #[test]
    fn unknown_scheme_is_reported_and_ignored() {
        let mut mapper = KeyMapper::new(MappingScheme::Numbers);
        assert_eq!(
            mapper.set_scheme("dvorak"),
            Err(ConfigError::UnknownScheme("dvorak".to_string()))
        );
        assert_eq!(mapper.current_scheme(), MappingScheme::Numbers);
    }

    #[test]
    fn letters_distinguish_the_two_e_strings() {
        let mapper = KeyMapper::default();
        assert_eq!(mapper.key_for(&note("E2")), Some(KeyAction::Char('e')));
        assert_eq!(mapper.key_for(&note("E4")), Some(KeyAction::Char('E')));
    }

    #[test]
    fn custom_mapping_only_affects_custom_scheme() {
        let mut mapper = KeyMapper::default();
        mapper.add_custom_mapping(note("G3"), KeyAction::Backspace);
        assert_eq!(mapper.key_for(&note("G3")), Some(KeyAction::Char('g')));
        mapper.set_scheme("CUSTOM").unwrap();
        assert_eq!(mapper.key_for(&note("G3")), Some(KeyAction::Backspace));
    }

    #[test]
    fn parses_note_key_pairs() {
        assert_eq!(
            parse_mapping("E2=backspace").unwrap(),
            (note("E2"), KeyAction::Backspace)
        );
        assert_eq!(parse_mapping("b3=x").unwrap(), (note("B3"), KeyAction::Char('x')));
        assert_eq!(parse_mapping("e4=Enter").unwrap().1, KeyAction::Enter);
        assert!(matches!(parse_mapping("E2"), Err(ConfigError::InvalidMapping(_))));
        assert!(matches!(parse_mapping("E2="), Err(ConfigError::InvalidMapping(_))));
        assert!(matches!(parse_mapping("C4=x"), Err(ConfigError::UnknownNote(_))));
        assert!(matches!(parse_mapping("E2=xy"), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn display_uses_key_names() {
        let mapper = KeyMapper::new(MappingScheme::Custom);
        let shown: Vec<String> = mapper
            .mappings()
            .iter()
            .map(|(n, k)| format!("{} → {}", n, k))
            .collect();
        assert_eq!(shown.len(), 6);
        assert_eq!(shown[0], "E2 → SPACE");
        assert_eq!(shown[5], "E4 → ENTER");
        assert_eq!(KeyAction::Enter.as_text(), "\n");
        assert_eq!(mapper.available_schemes(), vec!["letters", "numbers", "qwerty", "custom"]);
    }
}

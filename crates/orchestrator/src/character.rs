//! Characters and story rosters.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Distinguishes the narrator persona from ordinary characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Narrator,
    Character,
}

/// A persona descriptor. Read-only during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    /// Display name, also the matching key for speaker selection.
    pub name: String,
    /// Persona instructions.
    pub system_prompt: String,
    pub role: CharacterRole,
}

impl Character {
    /// An ordinary character.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: system_prompt.into(),
            role: CharacterRole::Character,
        }
    }

    /// The narrator persona.
    pub fn narrator(
        id: impl Into<String>,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            role: CharacterRole::Narrator,
            ..Self::new(id, name, system_prompt)
        }
    }

    pub fn is_narrator(&self) -> bool {
        self.role == CharacterRole::Narrator
    }
}

/// The fixed character list of a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    characters: Vec<Character>,
}

impl Roster {
    /// Build a roster. It must be non-empty, with unique names and at most
    /// one narrator.
    pub fn new(characters: Vec<Character>) -> Result<Self, OrchestratorError> {
        if characters.is_empty() {
            return Err(OrchestratorError::Configuration(
                "roster must contain at least one character".to_string(),
            ));
        }

        for (i, character) in characters.iter().enumerate() {
            if character.name.trim().is_empty() {
                return Err(OrchestratorError::Configuration(format!(
                    "character {} has an empty name",
                    character.id
                )));
            }
            if characters[..i].iter().any(|c| c.name == character.name) {
                return Err(OrchestratorError::Configuration(format!(
                    "duplicate character name: {}",
                    character.name
                )));
            }
        }

        if characters.iter().filter(|c| c.is_narrator()).count() > 1 {
            return Err(OrchestratorError::Configuration(
                "roster may contain only one narrator".to_string(),
            ));
        }

        Ok(Self { characters })
    }

    /// Legal speaker names, in roster order.
    pub fn candidate_names(&self) -> Vec<String> {
        self.characters.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a character by name.
    pub fn get(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    pub fn narrator(&self) -> Option<&Character> {
        self.characters.iter().find(|c| c.is_narrator())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new(vec![
            Character::narrator("n", "Narrator", "Describe the scene."),
            Character::new("a", "Alice", "You are Alice."),
        ])
        .unwrap()
    }

    #[test]
    fn test_candidate_names_in_order() {
        assert_eq!(roster().candidate_names(), vec!["Narrator", "Alice"]);
    }

    #[test]
    fn test_lookup() {
        let roster = roster();
        assert_eq!(roster.get("Alice").map(|c| c.id.as_str()), Some("a"));
        assert!(roster.get("alice").is_none());
        assert_eq!(roster.narrator().map(|c| c.name.as_str()), Some("Narrator"));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_empty_roster_rejected() {
        assert!(matches!(
            Roster::new(vec![]),
            Err(OrchestratorError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Roster::new(vec![
            Character::new("a1", "Alice", "p"),
            Character::new("a2", "Alice", "p"),
        ]);
        assert!(matches!(result, Err(OrchestratorError::Configuration(_))));
    }

    #[test]
    fn test_two_narrators_rejected() {
        let result = Roster::new(vec![
            Character::narrator("n1", "Narrator", "p"),
            Character::narrator("n2", "Voice", "p"),
        ]);
        assert!(result.is_err());
    }
}

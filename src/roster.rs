//! Speaker-name resolution and the on-stage roster.

use tracing::warn;

use crate::script::{NARRATOR, Script};

/// Map a free-form speaker name onto one of `keys`.
///
/// Rules, first match wins:
/// 1. empty names and the narrator never resolve;
/// 2. exact match;
/// 3. case-insensitive match;
/// 4. the name starts with a key ("Herbert Walker" -> "Herbert");
/// 5. a key starts with the name ("Herbert" -> "Herbert Walker").
///
/// When several keys satisfy rule 4 or 5 the longest key wins (the most specific one), ties
/// going to the key seen first. Such ambiguities are logged.
pub fn resolve_character_key<'k>(
    name: &str,
    keys: impl IntoIterator<Item = &'k str>,
) -> Option<&'k str> {
    if name.is_empty() || name == NARRATOR {
        return None;
    }
    let keys: Vec<&'k str> = keys.into_iter().collect();

    if let Some(k) = keys.iter().copied().find(|k| *k == name) {
        return Some(k);
    }

    let lname = name.to_lowercase();
    if let Some(k) = keys.iter().copied().find(|k| k.to_lowercase() == lname) {
        return Some(k);
    }

    let name_extends_key: Vec<&'k str> = keys
        .iter()
        .copied()
        .filter(|k| !k.is_empty() && lname.starts_with(&k.to_lowercase()))
        .collect();
    if let Some(k) = pick_most_specific(name, &name_extends_key) {
        return Some(k);
    }

    let key_extends_name: Vec<&'k str> = keys
        .iter()
        .copied()
        .filter(|k| k.to_lowercase().starts_with(&lname))
        .collect();
    pick_most_specific(name, &key_extends_name)
}

fn pick_most_specific<'k>(name: &str, candidates: &[&'k str]) -> Option<&'k str> {
    let mut best: Option<&'k str> = None;
    for &c in candidates {
        match best {
            Some(b) if b.len() >= c.len() => {}
            _ => best = Some(c),
        }
    }
    if candidates.len() > 1 {
        warn!(
            speaker = name,
            candidates = ?candidates,
            chosen = ?best,
            "ambiguous speaker name matches several characters"
        );
    }
    best
}

/// Characters on stage for one script, in first-seen order.
///
/// The order is the slot order used by the frame renderer and stays fixed for a whole pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    members: Vec<String>,
    unresolved: Vec<String>,
}

impl Roster {
    pub fn compute<'k>(script: &Script, keys: impl IntoIterator<Item = &'k str> + Clone) -> Self {
        let mut roster = Self::default();
        for line in script {
            let speaker = line.speaker.as_str();
            if speaker.is_empty() || speaker == NARRATOR {
                continue;
            }
            match resolve_character_key(speaker, keys.clone()) {
                Some(key) => {
                    if !roster.contains(key) {
                        roster.members.push(key.to_string());
                    }
                }
                None => {
                    if !roster.unresolved.iter().any(|u| u == speaker) {
                        warn!(speaker, "speaker does not match any configured character");
                        roster.unresolved.push(speaker.to_string());
                    }
                }
            }
        }
        roster
    }

    pub fn from_members(members: Vec<String>) -> Self {
        Self {
            members,
            unresolved: Vec::new(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Speakers that matched no configured character, first-seen order.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|m| m == key)
    }

    pub fn slot_of(&self, key: &str) -> Option<usize> {
        self.members.iter().position(|m| m == key)
    }

    /// Resolve a line's speaker against the roster members.
    pub fn resolve(&self, speaker: &str) -> Option<&str> {
        resolve_character_key(speaker, self.members.iter().map(String::as_str))
    }
}

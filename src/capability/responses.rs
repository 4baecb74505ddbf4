//! Response template categories and phrase filling

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use ahash::AHashMap;
use std::collections::BTreeMap;

/// Category of acknowledgement phrase for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseKind {
    StartingHarvest,
    GivingWood,
    Following,
    Engaging,
    Stopping,
    Inventory,
    /// Fallback for capabilities without an explicit category
    Greetings,
    Error,
}

/// Phrase sets keyed by category, loaded from the capability document
#[derive(Debug, Clone, Default)]
pub struct ResponseTemplates {
    sets: BTreeMap<ResponseKind, Vec<String>>,
}

impl ResponseTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ResponseKind, phrases: Vec<String>) {
        self.sets.insert(kind, phrases);
    }

    pub fn phrases(&self, kind: ResponseKind) -> &[String] {
        self.sets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick a random phrase of the category and fill its `{key}` placeholders
    ///
    /// Returns `None` when the category has no phrases.
    pub fn render<R: Rng + ?Sized>(
        &self,
        kind: ResponseKind,
        params: &AHashMap<String, String>,
        rng: &mut R,
    ) -> Option<String> {
        let template = self.phrases(kind).choose(rng)?;
        Some(fill(template, params))
    }
}

/// Replace every `{key}` with its value; unknown keys are left untouched
pub fn fill(template: &str, params: &AHashMap<String, String>) -> String {
    params.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(pairs: &[(&str, &str)]) -> AHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fill_replaces_all_occurrences() {
        let out = fill(
            "{name} and {name} at {distance}",
            &params(&[("name", "Alex"), ("distance", "2")]),
        );
        assert_eq!(out, "Alex and Alex at 2");
    }

    #[test]
    fn test_fill_leaves_unknown_keys() {
        assert_eq!(fill("hi {who}", &AHashMap::new()), "hi {who}");
    }

    #[test]
    fn test_render_picks_from_category() {
        let mut templates = ResponseTemplates::new();
        templates.insert(
            ResponseKind::Following,
            vec!["Following {playerName}".into()],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let text = templates
            .render(
                ResponseKind::Following,
                &params(&[("playerName", "Alex")]),
                &mut rng,
            )
            .unwrap();
        assert_eq!(text, "Following Alex");
        assert!(templates
            .render(ResponseKind::Engaging, &AHashMap::new(), &mut rng)
            .is_none());
    }

    #[test]
    fn test_kind_names_match_document_keys() {
        let json = serde_json::to_string(&ResponseKind::StartingHarvest).unwrap();
        assert_eq!(json, "\"startingHarvest\"");
    }
}

//! Word → component index used to rank suggestions.
//!
//! This is keyword matching, not language understanding. Anything that
//! answers "which components does this text talk about" can replace it.

use std::collections::{BTreeMap, HashMap};

use crate::descriptor::{ComponentDescriptor, ComponentId};

/// Description words this short or shorter are not indexed.
const MIN_DESCRIPTION_WORD_LEN: usize = 3;

/// Lower-cased word → components mentioning it.
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    words: HashMap<String, Vec<ComponentId>>,
}

/// Split on anything that is not alphanumeric and lower-case the pieces.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

impl SemanticIndex {
    /// Index category, display-name words, and longer description words.
    pub fn build<'a, I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = &'a ComponentDescriptor>,
    {
        let mut index = Self::default();
        for descriptor in descriptors {
            let id = descriptor.id();
            index.insert(descriptor.category.to_lowercase(), &id);

            if let Some(display_name) = &descriptor.display_name {
                for word in tokenize(display_name) {
                    index.insert(word, &id);
                }
            }

            if let Some(description) = &descriptor.description {
                for word in tokenize(description).filter(|w| w.chars().count() > MIN_DESCRIPTION_WORD_LEN) {
                    index.insert(word, &id);
                }
            }
        }
        index
    }

    fn insert(&mut self, word: String, id: &ComponentId) {
        let candidates = self.words.entry(word).or_default();
        if !candidates.contains(id) {
            candidates.push(id.clone());
        }
    }

    /// Components indexed under `word` (case-insensitive).
    pub fn lookup(&self, word: &str) -> &[ComponentId] {
        self.words
            .get(&word.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Score every component by how many distinct words of `text` hit it.
    /// Highest score first, ties broken by identity.
    pub fn rank(&self, text: &str) -> Vec<(ComponentId, usize)> {
        let mut words: Vec<String> = tokenize(text).collect();
        words.sort();
        words.dedup();

        let mut scores: BTreeMap<&ComponentId, usize> = BTreeMap::new();
        for word in &words {
            for id in self.lookup(word) {
                *scores.entry(id).or_default() += 1;
            }
        }

        let mut ranked: Vec<(ComponentId, usize)> = scores
            .into_iter()
            .map(|(id, score)| (id.clone(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(category: &str, name: &str, display: &str, description: &str) -> ComponentDescriptor {
        ComponentDescriptor {
            category: category.into(),
            name: name.into(),
            display_name: Some(display.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    #[test]
    fn indexes_category_display_and_long_description_words() {
        let d = descriptor("vectorstores", "Chroma", "Chroma DB", "Store and search the embeddings");
        let index = SemanticIndex::build([&d]);

        assert_eq!(index.lookup("vectorstores"), &[d.id()]);
        assert_eq!(index.lookup("CHROMA"), &[d.id()]);
        assert_eq!(index.lookup("db"), &[d.id()]);
        assert_eq!(index.lookup("embeddings"), &[d.id()]);
        // Short description words are skipped.
        assert!(index.lookup("and").is_empty());
        assert!(index.lookup("the").is_empty());
    }

    #[test]
    fn candidates_are_not_duplicated() {
        let d = descriptor("memories", "Buffer", "Buffer Memory", "buffer buffer buffer");
        let index = SemanticIndex::build([&d]);
        assert_eq!(index.lookup("buffer").len(), 1);
    }

    #[test]
    fn rank_orders_by_hits() {
        let chroma = descriptor("vectorstores", "Chroma", "Chroma", "Local vector database");
        let pinecone = descriptor("vectorstores", "Pinecone", "Pinecone", "Hosted vector database");
        let index = SemanticIndex::build([&chroma, &pinecone]);

        let ranked = index.rank("a hosted vector database please");
        assert_eq!(ranked[0].0, pinecone.id());
        assert_eq!(ranked[0].1, 3);
        assert_eq!(ranked[1].0, chroma.id());
        assert!(index.rank("nothing relevant").is_empty());
    }
}

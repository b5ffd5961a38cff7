use serde::{Deserialize, Deserializer, Serialize};

use crate::model::FavoriteCity;

/// Saved cities in insertion order, at most one entry per id.
///
/// Serialized as a plain JSON array. Deserializing keeps the first entry
/// for each id and drops the rest, so hand-edited or stale data cannot
/// break the invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Favorites(Vec<FavoriteCity>);

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `city` unless its id is already saved. Returns whether it was added.
    pub fn insert(&mut self, city: FavoriteCity) -> bool {
        if self.contains(city.id) {
            return false;
        }
        self.0.push(city);
        true
    }

    /// Remove the entry with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c.id != id);
        self.0.len() != before
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.iter().any(|c| c.id == id)
    }

    pub fn find(&self, id: i64) -> Option<&FavoriteCity> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&FavoriteCity> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FavoriteCity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<FavoriteCity> for Favorites {
    fn from_iter<I: IntoIterator<Item = FavoriteCity>>(iter: I) -> Self {
        let mut favorites = Favorites::new();
        for city in iter {
            favorites.insert(city);
        }
        favorites
    }
}

impl<'a> IntoIterator for &'a Favorites {
    type Item = &'a FavoriteCity;
    type IntoIter = std::slice::Iter<'a, FavoriteCity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Favorites {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cities = Vec::<FavoriteCity>::deserialize(deserializer)?;
        Ok(cities.into_iter().collect())
    }
}

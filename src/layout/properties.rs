//! Property sets attached to shapes and instances
//!
//! Shapes carry a property id; id 0 means "no properties". Identical sets
//! share one id within a repository.

use std::collections::{BTreeMap, HashMap};

pub type PropId = u64;

/// Name/value pairs of one property set
pub type PropertySet = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct PropertiesRepository {
    sets: Vec<PropertySet>,
    ids: HashMap<PropertySet, PropId>,
}

impl PropertiesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a property set, registering it if needed. The empty set is id 0.
    pub fn prop_id(&mut self, set: PropertySet) -> PropId {
        if set.is_empty() {
            return 0;
        }
        if let Some(id) = self.ids.get(&set) {
            return *id;
        }
        self.sets.push(set.clone());
        let id = self.sets.len() as PropId;
        self.ids.insert(set, id);
        id
    }

    pub fn properties(&self, id: PropId) -> Option<&PropertySet> {
        if id == 0 {
            return None;
        }
        self.sets.get(id as usize - 1)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Translates property ids from one repository into another
#[derive(Debug, Default)]
pub struct PropertyMapper {
    cache: HashMap<PropId, PropId>,
}

impl PropertyMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, id: PropId, src: &PropertiesRepository, dst: &mut PropertiesRepository) -> PropId {
        if id == 0 {
            return 0;
        }
        if let Some(mapped) = self.cache.get(&id) {
            return *mapped;
        }
        let mapped = src.properties(id).map(|s| dst.prop_id(s.clone())).unwrap_or(0);
        self.cache.insert(id, mapped);
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(k: &str, v: &str) -> PropertySet {
        let mut s = PropertySet::new();
        s.insert(k.to_string(), v.to_string());
        s
    }

    #[test]
    fn test_prop_ids_are_shared() {
        let mut repo = PropertiesRepository::new();
        let a = repo.prop_id(set("net", "VDD"));
        let b = repo.prop_id(set("net", "VDD"));
        let c = repo.prop_id(set("net", "VSS"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(repo.prop_id(PropertySet::new()), 0);
        assert_eq!(repo.properties(c).and_then(|s| s.get("net")).map(|s| s.as_str()), Some("VSS"));
    }

    #[test]
    fn test_mapper_between_repositories() {
        let mut src = PropertiesRepository::new();
        let mut dst = PropertiesRepository::new();
        dst.prop_id(set("x", "1"));
        let id = src.prop_id(set("net", "A"));
        let mut mapper = PropertyMapper::new();
        let mapped = mapper.map(id, &src, &mut dst);
        assert_eq!(mapped, 2);
        assert_eq!(dst.properties(mapped), src.properties(id));
        assert_eq!(mapper.map(0, &src, &mut dst), 0);
    }
}

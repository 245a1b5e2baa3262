use std::sync::Arc;

pub const DEFAULT_CLASS_LABELS: [&str; 17] = [
    "Adjustable spanner",
    "Backsaw",
    "Calipers",
    "Cutting pliers",
    "Drill",
    "Gas wrench",
    "Gun",
    "Hammer",
    "Hand",
    "Handsaw",
    "Needle-nose pliers",
    "Pliers",
    "Ratchet",
    "Screwdriver",
    "Tape measure",
    "Utility knife",
    "Wrench",
];

/// Class names indexed like the model's class indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabelTable {
    labels: Arc<[String]>,
}

impl ClassLabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels: labels.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, class_index: i64) -> Option<&str> {
        usize::try_from(class_index)
            .ok()
            .and_then(|idx| self.labels.get(idx))
            .map(String::as_str)
    }

    /// Label for `class_index`, or its decimal form when out of range.
    pub fn resolve(&self, class_index: i64) -> String {
        match self.get(class_index) {
            Some(label) => label.to_string(),
            None => class_index.to_string(),
        }
    }
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_in_range_indices() {
        let table = ClassLabelTable::default();
        assert_eq!(table.len(), 17);
        assert_eq!(table.resolve(0), "Adjustable spanner");
        assert_eq!(table.resolve(3), "Cutting pliers");
        assert_eq!(table.resolve(16), "Wrench");
    }

    #[test]
    fn falls_back_to_decimal_index() {
        let table = ClassLabelTable::new(vec!["a".into(), "b".into()]);
        assert_eq!(table.resolve(2), "2");
        assert_eq!(table.resolve(117), "117");
        assert_eq!(table.resolve(-1), "-1");
        assert_eq!(table.get(-1), None);
    }
}

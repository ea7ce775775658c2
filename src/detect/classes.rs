use serde::Serialize;

/// What a detector class means for the safety verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HelmetClass {
    Helmet,
    NoHelmet,
    Unknown,
}

/// Ordered class-name table, resolved once into [`HelmetClass`] kinds.
///
/// Labels are matched case-insensitively after trimming, so "With Helmet",
/// "with helmet " and "WITH HELMET" resolve the same way.
#[derive(Clone, Debug)]
pub struct ClassTable {
    names: Vec<String>,
    kinds: Vec<HelmetClass>,
}

impl ClassTable {
    pub fn new(
        names: &[String],
        helmet_labels: &[String],
        no_helmet_labels: &[String],
    ) -> Self {
        let helmet: Vec<String> = helmet_labels.iter().map(|l| normalize(l)).collect();
        let no_helmet: Vec<String> = no_helmet_labels.iter().map(|l| normalize(l)).collect();
        let kinds = names
            .iter()
            .map(|name| {
                let name = normalize(name);
                if helmet.contains(&name) {
                    HelmetClass::Helmet
                } else if no_helmet.contains(&name) {
                    HelmetClass::NoHelmet
                } else {
                    HelmetClass::Unknown
                }
            })
            .collect();
        Self {
            names: names.iter().map(|n| n.trim().to_string()).collect(),
            kinds,
        }
    }

    /// Two-class helmet dataset order: 0 is "with helmet", 1 is "without helmet".
    pub fn default_helmet() -> Self {
        Self::new(
            &["with helmet".to_string(), "without helmet".to_string()],
            &["helmet".to_string(), "with helmet".to_string()],
            &["no_helmet".to_string(), "without helmet".to_string()],
        )
    }

    /// Label for a class id; out-of-range ids fall back to the stringified id.
    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn kind(&self, class_id: usize) -> HelmetClass {
        self.kinds
            .get(class_id)
            .copied()
            .unwrap_or(HelmetClass::Unknown)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_labels_case_insensitively() {
        let table = ClassTable::new(
            &strings(&["With Helmet", "Without Helmet", "person"]),
            &strings(&["helmet", "with helmet"]),
            &strings(&["no_helmet", "without helmet"]),
        );
        assert_eq!(table.kind(0), HelmetClass::Helmet);
        assert_eq!(table.kind(1), HelmetClass::NoHelmet);
        assert_eq!(table.kind(2), HelmetClass::Unknown);
        assert_eq!(table.label(0), "With Helmet");
    }

    #[test]
    fn out_of_range_ids_use_numeric_label() {
        let table = ClassTable::default_helmet();
        assert_eq!(table.label(0), "with helmet");
        assert_eq!(table.kind(0), HelmetClass::Helmet);
        assert_eq!(table.kind(1), HelmetClass::NoHelmet);
        assert_eq!(table.label(5), "5");
        assert_eq!(table.kind(5), HelmetClass::Unknown);
    }
}

use indexmap::IndexMap;

/// Static facts about one species, keyed in the catalog by its lowercase name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalRecord {
    pub classification: String,
    pub venomous: bool,
    pub dangerous: bool,
    pub remediation: String,
}

impl AnimalRecord {
    pub fn new(
        classification: impl Into<String>,
        venomous: bool,
        dangerous: bool,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            classification: classification.into(),
            venomous,
            dangerous,
            remediation: remediation.into(),
        }
    }
}

/// Read-only lookup table from classifier label to [`AnimalRecord`].
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it while
/// the server runs.
#[derive(Debug, Clone, Default)]
pub struct AnimalCatalog {
    records: IndexMap<String, AnimalRecord>,
}

impl AnimalCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::new()
            .with_record(
                "cat",
                AnimalRecord::new(
                    "Mammal, Carnivora, Felidae",
                    false,
                    false,
                    "Cats are harmless. Remove food sources and contact a local animal shelter to rehome strays.",
                ),
            )
            .with_record(
                "lion",
                AnimalRecord::new(
                    "Mammal, Carnivora, Felidae, Panthera",
                    false,
                    true,
                    "Do not approach or run. Back away slowly, get indoors or into a vehicle and call wildlife authorities.",
                ),
            )
            .with_record(
                "cobra",
                AnimalRecord::new(
                    "Reptile, Squamata, Elapidae",
                    true,
                    true,
                    "Keep at least two metres away and do not provoke it. Call a professional snake rescuer; seek medical help at once if bitten.",
                ),
            )
    }

    /// Adds a record, lowercasing the key.
    pub fn with_record(mut self, name: &str, record: AnimalRecord) -> Self {
        self.records.insert(name.to_lowercase(), record);
        self
    }

    /// Case-insensitive lookup by species name.
    pub fn lookup(&self, name: &str) -> Option<&AnimalRecord> {
        self.records.get(name.to_lowercase().as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_has_three_lowercase_keys() {
        let catalog = AnimalCatalog::builtin();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["cat", "lion", "cobra"]);
        assert!(names.iter().all(|n| *n == n.to_lowercase()));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = AnimalCatalog::builtin();
        for name in ["cat", "lion", "cobra"] {
            let lower = catalog.lookup(name).unwrap();
            assert_eq!(catalog.lookup(&name.to_uppercase()), Some(lower));
        }
        assert_eq!(catalog.lookup("CoBrA"), catalog.lookup("cobra"));
    }

    #[test]
    fn test_lookup_unknown_name() {
        let catalog = AnimalCatalog::builtin();
        assert!(catalog.lookup("elephant").is_none());
        assert!(catalog.lookup("").is_none());
        assert!(catalog.lookup("lions").is_none());
    }

    #[test]
    fn test_record_flags() {
        let catalog = AnimalCatalog::builtin();
        let lion = catalog.lookup("lion").unwrap();
        assert!(lion.dangerous);
        assert!(!lion.venomous);
        let cobra = catalog.lookup("cobra").unwrap();
        assert!(cobra.dangerous && cobra.venomous);
    }

    #[test]
    fn test_with_record_lowercases_key() {
        let catalog = AnimalCatalog::new().with_record(
            "Tabby",
            AnimalRecord::new("Mammal", false, false, "Leave it be."),
        );
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("tabby").is_some());
    }
}

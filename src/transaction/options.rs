use crate::connection::DEFAULT_ALIAS;

/// Datastore aliases that take part in one transactional operation
///
/// Aliases are opened, committed and rolled back in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    aliases: Vec<String>,
}

impl TxOptions {
    /// Build options from a list of aliases
    ///
    /// Duplicates are dropped (first occurrence wins); an empty list falls
    /// back to the primary alias.
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for alias in aliases {
            let alias = alias.into();
            if !unique.contains(&alias) {
                unique.push(alias);
            }
        }

        if unique.is_empty() {
            return Self::default();
        }

        Self { aliases: unique }
    }

    pub fn single(alias: impl Into<String>) -> Self {
        Self {
            aliases: vec![alias.into()],
        }
    }

    /// Add another participating alias
    pub fn with(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl Default for TxOptions {
    fn default() -> Self {
        Self::single(DEFAULT_ALIAS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_primary_alias() {
        assert_eq!(TxOptions::default().aliases(), ["default"]);
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let options = TxOptions::new(["default", "ledger", "default"]).with("ledger").with("audit");
        assert_eq!(options.aliases(), ["default", "ledger", "audit"]);
    }

    #[test]
    fn test_empty_list_falls_back_to_default() {
        assert_eq!(TxOptions::new(Vec::<String>::new()), TxOptions::default());
    }
}

use serde::Deserialize;

use crate::algorithm::HashAlgorithm;
use crate::error::DictionaryError;

fn default_hash_algorithm() -> String {
    HashAlgorithm::default().name().to_string()
}

/// Dictionary settings, usually read from a TOML file:
///
/// ```toml
/// hash_algorithm = "md5"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: default_hash_algorithm(),
        }
    }
}

impl DictionaryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, DictionaryError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves the configured name against the algorithm registry.
    pub fn algorithm(&self) -> Result<HashAlgorithm, DictionaryError> {
        self.hash_algorithm.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_sha256() {
        let config = DictionaryConfig::from_toml_str("").unwrap();
        assert_eq!(config.algorithm().unwrap(), HashAlgorithm::Sha256);
    }

    #[test]
    fn explicit_algorithm() {
        let config = DictionaryConfig::from_toml_str("hash_algorithm = \"SHA512\"").unwrap();
        assert_eq!(config.algorithm().unwrap(), HashAlgorithm::Sha512);
    }

    #[test]
    fn unknown_algorithm_fails_on_resolve() {
        let config = DictionaryConfig::from_toml_str("hash_algorithm = \"whirlpool\"").unwrap();
        assert!(matches!(
            config.algorithm(),
            Err(DictionaryError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn malformed_toml() {
        assert!(matches!(
            DictionaryConfig::from_toml_str("hash_algorithm = "),
            Err(DictionaryError::InvalidConfig(_))
        ));
    }
}

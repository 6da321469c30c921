use std::fmt;
use std::str::FromStr;

use ragchat_core::error::Error;

/// The closed set of index implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexBackend {
    /// In-memory brute-force cosine scan, persisted as flat files.
    Flat,
    /// LanceDB table under `<index path>/lance`.
    Lance,
}

impl IndexBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexBackend::Flat => "flat",
            IndexBackend::Lance => "lance",
        }
    }
}

impl FromStr for IndexBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(IndexBackend::Flat),
            "lance" => Ok(IndexBackend::Lance),
            _ => Err(Error::UnsupportedBackend(s.to_string())),
        }
    }
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("FLAT".parse::<IndexBackend>().unwrap(), IndexBackend::Flat);
        assert_eq!(" Lance ".parse::<IndexBackend>().unwrap(), IndexBackend::Lance);
        assert!(matches!("faiss".parse::<IndexBackend>(), Err(Error::UnsupportedBackend(name)) if name == "faiss"));
    }
}

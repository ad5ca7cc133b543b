//! Per-document analysis results keyed by document identity.
//!
//! Every update re-parses the whole text into a fresh [`Code`]; nothing is
//! patched in place. A result whose version is older than the stored one
//! is dropped, so the latest text wins when updates race. Updates hold the
//! configuration read lock from analysis to insertion, so every stored
//! [`Code`] was built with the current configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use atlint_cfg::{AnalysisConfig, Code};

use crate::{Error, Result};

/// One analysed document version.
#[derive(Clone, Debug)]
pub struct Document {
    pub version: i64,
    pub text: Arc<str>,
    pub code: Arc<Code>,
}

/// Thread-safe store of the latest analysis per document.
#[derive(Debug, Default)]
pub struct Documents {
    config: RwLock<AnalysisConfig>,
    entries: RwLock<FxHashMap<String, Document>>,
}

impl Documents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            entries: RwLock::new(FxHashMap::default()),
        })
    }

    /// Analyse `text` as version `version` of `uri`.
    ///
    /// Returns the stored analysis, or `None` when a newer version was
    /// stored first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the store's configuration is invalid.
    pub fn update(&self, uri: &str, version: i64, text: &str) -> Result<Option<Arc<Code>>> {
        let config = self.config.read();
        let code = Arc::new(Code::with_config(text, &config)?);
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(uri) {
            if existing.version > version {
                trace!(uri, version, stored = existing.version, "stale update dropped");
                return Ok(None);
            }
        }
        debug!(uri, version, rounds = code.rounds(), "document analysed");
        entries.insert(
            uri.to_string(),
            Document {
                version,
                text: Arc::from(text),
                code: Arc::clone(&code),
            },
        );
        drop(entries);
        drop(config);
        Ok(Some(code))
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Document> {
        self.entries.read().get(uri).cloned()
    }

    /// Latest analysis of `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDocument`] if `uri` is not open.
    pub fn code(&self, uri: &str) -> Result<Arc<Code>> {
        self.entries
            .read()
            .get(uri)
            .map(|d| Arc::clone(&d.code))
            .ok_or_else(|| Error::UnknownDocument(uri.to_string()))
    }

    /// Forget `uri`; returns whether it was open.
    pub fn close(&self, uri: &str) -> bool {
        self.entries.write().remove(uri).is_some()
    }

    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.entries.read().keys().cloned().collect();
        uris.sort_unstable();
        uris
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub fn config(&self) -> AnalysisConfig {
        self.config.read().clone()
    }

    /// Replace the configuration and re-analyse every open document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate; the store
    /// is left unchanged.
    pub fn set_config(&self, config: AnalysisConfig) -> Result<()> {
        config.validate()?;
        let mut current = self.config.write();
        let mut entries = self.entries.write();
        let refreshed: Vec<(String, Document)> = entries
            .par_iter()
            .map(|(uri, doc)| -> Result<(String, Document)> {
                let code = Code::with_config(&doc.text, &config)?;
                Ok((
                    uri.clone(),
                    Document {
                        version: doc.version,
                        text: Arc::clone(&doc.text),
                        code: Arc::new(code),
                    },
                ))
            })
            .collect::<Result<_>>()?;
        debug!(documents = refreshed.len(), "configuration changed");
        entries.extend(refreshed);
        drop(entries);
        *current = config;
        drop(current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_version_wins() {
        let docs = Documents::new();
        assert!(docs.update("a.s", 2, "nop\nret\n").unwrap().is_some());
        assert!(docs.update("a.s", 1, "ret\n").unwrap().is_none());
        let doc = docs.get("a.s").unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.code.instructions().len(), 2);

        assert!(docs.update("a.s", 3, "ret\n").unwrap().is_some());
        assert_eq!(docs.code("a.s").unwrap().instructions().len(), 1);
    }

    #[test]
    fn test_documents_are_independent() {
        let docs = Documents::new();
        docs.update("a.s", 1, "nop\n").unwrap();
        docs.update("b.s", 1, "nop\nnop\n").unwrap();
        assert_eq!(docs.uris(), vec!["a.s".to_string(), "b.s".to_string()]);
        assert!(docs.close("a.s"));
        assert!(!docs.close("a.s"));
        assert!(matches!(docs.code("a.s"), Err(Error::UnknownDocument(_))));
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_set_config_reanalyses() {
        let docs = Documents::new();
        let src = "call f\nhlt\n; @SUBROUTINE\nf: ret\n";
        docs.update("a.s", 1, src).unwrap();
        assert_eq!(docs.code("a.s").unwrap().subroutines().len(), 2);

        let config = AnalysisConfig::default().with_subroutine_checking(false);
        docs.set_config(config).unwrap();
        assert_eq!(docs.code("a.s").unwrap().subroutines().len(), 1);
        assert!(!docs.config().subroutine_checking);

        let bad = AnalysisConfig::default().with_max_rounds(0);
        assert!(matches!(docs.set_config(bad), Err(Error::Config(_))));
    }

    #[test]
    fn test_updates_racing_config_change_use_current_config() {
        let docs = Documents::new();
        let src = "call f\nhlt\n; @SUBROUTINE\nf: ret\n";
        std::thread::scope(|s| {
            s.spawn(|| {
                for version in 0..200 {
                    docs.update("a.s", version, src).unwrap();
                }
            });
            s.spawn(|| {
                for i in 0..50 {
                    let config = AnalysisConfig::default().with_subroutine_checking(i % 2 == 0);
                    docs.set_config(config).unwrap();
                }
            });
        });
        let code = docs.code("a.s").unwrap();
        assert_eq!(code.config(), &docs.config());
        assert_eq!(docs.get("a.s").unwrap().version, 199);
    }
}

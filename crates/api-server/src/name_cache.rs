use dashmap::DashMap;
use market_core::TickerDirectory;
use std::sync::Arc;

/// Bounded symbol → company name map shared by request handlers
#[derive(Clone)]
pub struct NameCache {
    directory: Arc<dyn TickerDirectory>,
    names: Arc<DashMap<String, String>>,
    capacity: usize,
}

impl NameCache {
    pub fn new(directory: Arc<dyn TickerDirectory>, capacity: usize) -> Self {
        Self {
            directory,
            names: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Company name for a symbol, falling back to the symbol itself when the
    /// lookup fails or finds nothing. Failed lookups are not cached.
    pub async fn resolve(&self, symbol: &str) -> String {
        if let Some(name) = self.names.get(symbol) {
            return name.clone();
        }

        match self.directory.company_name(symbol).await {
            Ok(Some(name)) => {
                self.insert(symbol, &name);
                name
            }
            Ok(None) => symbol.to_string(),
            Err(e) => {
                tracing::warn!("Company name lookup failed for {}: {}", symbol, e);
                symbol.to_string()
            }
        }
    }

    fn insert(&self, symbol: &str, name: &str) {
        if self.names.len() >= self.capacity {
            // Evict an arbitrary entry; names are cheap to look up again
            let victim = self.names.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.names.remove(&victim);
            }
        }
        self.names.insert(symbol.to_string(), name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

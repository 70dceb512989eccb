//! Product reference catalog.
//!
//! The full product record lives with an external catalog service; the ledger only
//! reads the fields it enforces (reorder threshold, backorder policy) plus a few
//! descriptive ones for listings.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::info;

use stockledger_core::{DomainError, DomainResult};
use stockledger_inventory::{Product, Sku};

/// Read-mostly product reference store.
pub trait ProductCatalog: Send + Sync {
    fn get(&self, sku: &Sku) -> Option<Product>;

    /// Register or replace a product reference. Returns the previous record, if any.
    fn upsert(&self, product: Product) -> DomainResult<Option<Product>>;

    fn list(&self) -> Vec<Product>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get(&self, sku: &Sku) -> Option<Product> {
        (**self).get(sku)
    }

    fn upsert(&self, product: Product) -> DomainResult<Option<Product>> {
        (**self).upsert(product)
    }

    fn list(&self) -> Vec<Product> {
        (**self).list()
    }
}

/// In-memory catalog for tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    inner: RwLock<HashMap<Sku, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> DomainResult<Self> {
        let catalog = Self::new();
        for product in products {
            catalog.upsert(product)?;
        }
        Ok(catalog)
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get(&self, sku: &Sku) -> Option<Product> {
        let map = self.inner.read().ok()?;
        map.get(sku).cloned()
    }

    fn upsert(&self, product: Product) -> DomainResult<Option<Product>> {
        product.validate()?;
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("catalog lock poisoned"))?;
        Ok(map.insert(product.sku.clone(), product))
    }

    fn list(&self) -> Vec<Product> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let mut products: Vec<_> = map.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        products
    }
}

/// Catalog persisted as a JSON array of products.
///
/// The whole file is rewritten (temp file, `sync_all`, rename) on every upsert, so a
/// crash leaves either the old or the new catalog on disk.
#[derive(Debug)]
pub struct FileProductCatalog {
    path: PathBuf,
    products: InMemoryProductCatalog,
    /// Serializes rewrites of the file.
    writer: Mutex<()>,
}

impl FileProductCatalog {
    /// Open (or start) a catalog file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let loaded: Vec<Product> = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let count = loaded.len();
        let products = InMemoryProductCatalog::with_products(loaded)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        info!(path = %path.display(), products = count, "product catalog opened");

        Ok(Self {
            path,
            products,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, products: &[Product]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(products)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
    }
}

impl ProductCatalog for FileProductCatalog {
    fn get(&self, sku: &Sku) -> Option<Product> {
        self.products.get(sku)
    }

    fn upsert(&self, product: Product) -> DomainResult<Option<Product>> {
        product.validate()?;
        let _writer = self
            .writer
            .lock()
            .map_err(|_| DomainError::invariant("catalog lock poisoned"))?;

        let mut next: Vec<Product> = self
            .products
            .list()
            .into_iter()
            .filter(|p| p.sku != product.sku)
            .collect();
        next.push(product.clone());
        next.sort_by(|a, b| a.sku.cmp(&b.sku));

        self.persist(&next)
            .map_err(|e| DomainError::invariant(format!("catalog write failed: {e}")))?;
        self.products.upsert(product)
    }

    fn list(&self) -> Vec<Product> {
        self.products.list()
    }
}

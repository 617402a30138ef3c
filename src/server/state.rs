//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Book, Database, User};
use crate::error::{AppError, Result};
use crate::fb2;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extracted text cached for one book.
struct CachedText {
    /// File mtime at extraction; a change invalidates the entry.
    mtime: i64,
    text: Arc<String>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Extracted-text cache keyed by book ID.
    texts: Arc<RwLock<HashMap<String, CachedText>>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, db: Database, auth: AuthService) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            texts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up a book and enforce the ownership invariant.
    ///
    /// A book owned by another user is a 403, not a 404.
    pub fn owned_book(&self, user: &User, book_id: &str) -> Result<Book> {
        let book = self
            .db
            .get_book(book_id)?
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", book_id)))?;

        if book.owner_id != user.id {
            return Err(AppError::Forbidden(format!(
                "Book belongs to another user: {}",
                book_id
            )));
        }

        Ok(book)
    }

    /// Get the extracted text of a book, re-parsing only when the stored
    /// file changed since the cached extraction.
    pub fn book_text(&self, book: &Book) -> Result<Arc<String>> {
        let capacity = self.config.reader.max_cached_books;
        let path = Path::new(&book.path);
        let mtime = file_mtime(path);

        if capacity > 0 {
            let texts = self.texts.read();
            if let Some(cached) = texts.get(&book.id)
                && cached.mtime == mtime
            {
                return Ok(Arc::clone(&cached.text));
            }
        }

        let text = Arc::new(fb2::extract_text(path)?);

        if capacity > 0 {
            let mut texts = self.texts.write();
            if texts.len() >= capacity && !texts.contains_key(&book.id) {
                let stale = texts.keys().next().cloned();
                if let Some(stale) = stale {
                    texts.remove(&stale);
                }
            }
            texts.insert(
                book.id.clone(),
                CachedText {
                    mtime,
                    text: Arc::clone(&text),
                },
            );
        }

        Ok(text)
    }

    /// Write uploaded book bytes under the uploads directory.
    pub fn store_upload(&self, book_id: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = &self.config.storage.uploads_dir;
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.fb2", book_id));
        std::fs::write(&path, data)?;
        Ok(path)
    }

    /// Remove a book's stored file and drop its cached text.
    pub fn remove_stored(&self, book: &Book) -> Result<()> {
        self.texts.write().remove(&book.id);

        match std::fs::remove_file(&book.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File modification time in UNIX seconds (0 when unavailable).
fn file_mtime(path: &Path) -> i64 {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

//! HTTP request handlers.

use crate::db::{self, Book, Bookmark};
use crate::error::{AppError, Result};
use crate::fb2;
use crate::reader;
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// FB2 content type.
const FB2_MIME: &str = "application/x-fictionbook+xml";

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>📖 {title}</h1>
    <p>Personal FB2 library. Register, upload books, read them page by page
    and resume from your bookmark.</p>
    <h2>API</h2>
    <ul>
        <li><code>POST /api/auth/register</code> - create an account</li>
        <li><code>POST /api/auth/login</code> - obtain a token</li>
        <li><code>GET /api/books</code> - your library</li>
        <li><code>POST /api/books?filename=book.fb2</code> - upload</li>
        <li><code>GET /api/books/{{id}}/page</code> - read</li>
        <li><code>PUT /api/books/{{id}}/bookmark</code> - save position</li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
    );

    Html(html)
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: String,
    username: String,
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>> {
    let _user = state.auth.register(&req.username, &req.password)?;
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// BOOK API
// ============================================================================

/// List the requester's books.
pub async fn books_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Book>>> {
    let user = get_authenticated_user(&state, &headers)?;
    let books = state.db.list_user_books(&user.id)?;
    Ok(Json(books))
}

/// Upload query parameters.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    filename: String,
}

/// Upload a new FB2 book (raw bytes body).
pub async fn books_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: axum::body::Bytes,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers)?;

    let filename = params.filename.trim();
    if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
        return Err(AppError::InvalidFormat(format!(
            "Invalid file name: {}",
            params.filename
        )));
    }
    if !filename.to_lowercase().ends_with(".fb2") {
        return Err(AppError::InvalidFormat(
            "Only FB2 files are supported".to_string(),
        ));
    }
    if body.is_empty() {
        return Err(AppError::InvalidFormat("Empty upload".to_string()));
    }

    // Label the book from its metadata; a file that does not parse is still
    // accepted and reported as unreadable when opened.
    let info = match fb2::extract_metadata(&body) {
        Ok(info) => info,
        Err(e) => {
            tracing::debug!(filename = %filename, error = %e, "Failed to extract FB2 metadata");
            fb2::BookInfo::default()
        }
    };

    // Extension already validated; keep the stem as the fallback title.
    let stem = &filename[..filename.len() - 4];
    let fallback_title = if stem.is_empty() {
        filename.to_string()
    } else {
        stem.to_string()
    };

    let id = uuid::Uuid::new_v4().to_string();
    let path = state.store_upload(&id, &body)?;

    let book = Book {
        id,
        owner_id: user.id,
        title: info.title.unwrap_or(fallback_title),
        author: info.author,
        path: path.to_string_lossy().to_string(),
        file_size: body.len() as i64,
        created_at: db::now_timestamp(),
    };

    state.db.create_book(&book)?;
    tracing::info!(book = %book.id, title = %book.title, "Book uploaded");

    Ok(Json(book))
}

/// Book metadata (JSON).
pub async fn book_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;
    Ok(Json(book))
}

/// Delete a book, its stored file and (via cascade) its bookmarks.
pub async fn book_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    state.db.delete_book(&book.id)?;
    state.remove_stored(&book)?;

    Ok(StatusCode::OK)
}

/// Book download.
pub async fn book_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response<Body>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    let file = tokio::fs::File::open(&book.path).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let content_disposition = format!("attachment; filename=\"{}.fb2\"", book.id);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, FB2_MIME)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, book.file_size)
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// READING API
// ============================================================================

/// Page query parameters.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    /// Character offset to read from; the saved bookmark (or 0) when absent.
    position: Option<usize>,
}

/// One page of a book.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    book_id: String,
    title: String,
    position: usize,
    content: String,
    next_position: Option<usize>,
    total_chars: usize,
}

/// Read one page of a book.
///
/// Reading never moves the bookmark; only an explicit bookmark update does.
pub async fn book_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    let text = state.book_text(&book)?;
    if text.is_empty() {
        return Err(AppError::EmptyBook(format!(
            "No readable text in book: {}",
            book.id
        )));
    }

    let position = match params.position {
        Some(p) => p,
        None => state
            .db
            .get_bookmark(&user.id, &book.id)?
            .map(|b| b.position.max(0) as usize)
            .unwrap_or(0),
    };

    let page = reader::paginate(&text, position, state.config.reader.page_size);

    Ok(Json(PageResponse {
        book_id: book.id,
        title: book.title,
        position,
        content: page.content,
        next_position: page.next_position,
        total_chars: reader::char_count(&text),
    }))
}

// ============================================================================
// BOOKMARK API
// ============================================================================

/// Bookmark update request.
#[derive(Debug, Deserialize)]
pub struct BookmarkRequest {
    position: u64,
}

/// Get the saved bookmark for a book.
pub async fn bookmark_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Option<Bookmark>>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    let bookmark = state.db.get_bookmark(&user.id, &book.id)?;
    Ok(Json(bookmark))
}

/// Save the reading position for a book.
///
/// Any non-negative offset is accepted as-is; an offset past the end of the
/// text simply reads back as the empty final page.
pub async fn bookmark_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<BookmarkRequest>,
) -> Result<Json<Bookmark>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    let position = i64::try_from(req.position)
        .map_err(|_| AppError::InvalidFormat(format!("Position too large: {}", req.position)))?;

    let bookmark = Bookmark {
        user_id: user.id,
        book_id: book.id,
        position,
        updated_at: db::now_timestamp(),
    };

    state.db.save_bookmark(&bookmark)?;
    Ok(Json(bookmark))
}

/// Delete the saved bookmark for a book.
pub async fn bookmark_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.owned_book(&user, &id)?;

    state.db.delete_bookmark(&user.id, &book.id)?;
    Ok(StatusCode::OK)
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}

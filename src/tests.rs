use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Book, Bookmark, Database, Session, User, now_timestamp};
use crate::error::AppError;
use crate::reader;
use crate::server::AppState;
use std::sync::Arc;

const SAMPLE_FB2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
  <description>
    <title-info>
      <author><first-name>Антон</first-name><last-name>Чехов</last-name></author>
      <book-title>Степь</book-title>
    </title-info>
  </description>
  <body>
    <section>
      <p>Из города выехала бричка.</p>
      <p>Ехали долго.</p>
      <p>Наступил вечер.</p>
    </section>
  </body>
</FictionBook>"#;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn test_state(uploads: &std::path::Path) -> AppState {
    let mut config = Config::default();
    config.storage.uploads_dir = uploads.to_path_buf();

    let db = Database::open_memory().unwrap();
    let auth = AuthService::new(db.clone(), 30, true);
    AppState::new(config, db, auth)
}

fn create_user(db: &Database, id: &str, username: &str) {
    let user = User {
        id: id.to_string(),
        username: username.to_string(),
        password_hash: "hash".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn create_book(db: &Database, id: &str, owner_id: &str, title: &str) {
    let book = Book {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        title: title.to_string(),
        author: None,
        path: format!("/test/{}.fb2", id),
        file_size: 1000,
        created_at: now_timestamp(),
    };
    db.create_book(&book).unwrap();
}

fn setup_user_and_book(db: &Database) {
    create_user(db, "user-1", "testuser");
    create_book(db, "book-1", "user-1", "Test Book");
}

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    let user = User {
        id: "user-1".to_string(),
        username: "alice".to_string(),
        password_hash: "hash".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };

    db.create_user(&user).unwrap();

    let found = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(found.id, "user-1");
    assert_eq!(found.username, "alice");

    let found_by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(found_by_id.username, "alice");
}

#[test]
fn db_duplicate_username_fails() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let dup = User {
        id: "user-2".to_string(),
        username: "alice".to_string(),
        password_hash: "hash2".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    assert!(db.create_user(&dup).is_err());
}

#[test]
fn db_delete_user() {
    let db = test_db();
    create_user(&db, "user-1", "bob");

    assert!(db.delete_user("bob").unwrap());
    assert!(db.get_user_by_username("bob").unwrap().is_none());
}

#[test]
fn db_create_and_get_session() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let session = Session {
        token: "token123".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&session).unwrap();

    let found = db.get_session("token123").unwrap().unwrap();
    assert_eq!(found.user_id, "user-1");
}

#[test]
fn db_delete_session() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let session = Session {
        token: "token456".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&session).unwrap();
    db.delete_session("token456").unwrap();
    assert!(db.get_session("token456").unwrap().is_none());
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let expired = Session {
        token: "expired".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    };
    let valid = Session {
        token: "valid".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&expired).unwrap();
    db.create_session(&valid).unwrap();

    db.cleanup_expired_sessions().unwrap();

    assert!(db.get_session("expired").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

#[test]
fn db_create_and_get_book() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let book = Book {
        id: "book-1".to_string(),
        owner_id: "user-1".to_string(),
        title: "Степь".to_string(),
        author: Some("Антон Чехов".to_string()),
        path: "/test/book-1.fb2".to_string(),
        file_size: 1024,
        created_at: now_timestamp(),
    };

    db.create_book(&book).unwrap();

    let found = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(found.title, "Степь");
    assert_eq!(found.author, Some("Антон Чехов".to_string()));
}

#[test]
fn db_list_user_books_only_own() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_user(&db, "user-2", "bob");

    create_book(&db, "book-1", "user-1", "Alpha");
    create_book(&db, "book-2", "user-1", "Beta");
    create_book(&db, "book-3", "user-2", "Gamma");

    let books = db.list_user_books("user-1").unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].title, "Alpha");
    assert_eq!(books[1].title, "Beta");
}

#[test]
fn db_delete_book() {
    let db = test_db();
    setup_user_and_book(&db);

    assert!(db.delete_book("book-1").unwrap());
    assert!(db.get_book("book-1").unwrap().is_none());
}

#[test]
fn db_bookmark_upsert_keeps_one_row() {
    let db = test_db();
    setup_user_and_book(&db);

    let first = Bookmark {
        user_id: "user-1".to_string(),
        book_id: "book-1".to_string(),
        position: 2000,
        updated_at: now_timestamp(),
    };
    db.save_bookmark(&first).unwrap();

    let second = Bookmark {
        position: 4000,
        updated_at: now_timestamp() + 1,
        ..first
    };
    db.save_bookmark(&second).unwrap();

    let found = db.get_bookmark("user-1", "book-1").unwrap().unwrap();
    assert_eq!(found.position, 4000);
}

#[test]
fn db_bookmarks_are_per_user() {
    let db = test_db();
    create_user(&db, "user-1", "alice");
    create_user(&db, "user-2", "bob");
    create_book(&db, "book-1", "user-1", "Shared Title");

    let alice = Bookmark {
        user_id: "user-1".to_string(),
        book_id: "book-1".to_string(),
        position: 100,
        updated_at: now_timestamp(),
    };
    let bob = Bookmark {
        user_id: "user-2".to_string(),
        book_id: "book-1".to_string(),
        position: 900,
        updated_at: now_timestamp(),
    };

    db.save_bookmark(&alice).unwrap();
    db.save_bookmark(&bob).unwrap();

    assert_eq!(
        db.get_bookmark("user-1", "book-1").unwrap().unwrap().position,
        100
    );
    assert_eq!(
        db.get_bookmark("user-2", "book-1").unwrap().unwrap().position,
        900
    );
}

#[test]
fn db_delete_bookmark() {
    let db = test_db();
    setup_user_and_book(&db);

    let bookmark = Bookmark {
        user_id: "user-1".to_string(),
        book_id: "book-1".to_string(),
        position: 42,
        updated_at: now_timestamp(),
    };
    db.save_bookmark(&bookmark).unwrap();

    assert!(db.delete_bookmark("user-1", "book-1").unwrap());
    assert!(db.get_bookmark("user-1", "book-1").unwrap().is_none());
}

#[test]
fn db_deleting_book_cascades_bookmark() {
    let db = test_db();
    setup_user_and_book(&db);

    let bookmark = Bookmark {
        user_id: "user-1".to_string(),
        book_id: "book-1".to_string(),
        position: 42,
        updated_at: now_timestamp(),
    };
    db.save_bookmark(&bookmark).unwrap();

    db.delete_book("book-1").unwrap();
    assert!(db.get_bookmark("user-1", "book-1").unwrap().is_none());
}

#[test]
fn auth_create_user_and_login() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let user = auth.create_user("testuser", "password123").unwrap();
    assert_eq!(user.username, "testuser");

    let (logged_in, token) = auth.login("testuser", "password123").unwrap();
    assert_eq!(logged_in.username, "testuser");
    assert!(!token.is_empty());
}

#[test]
fn auth_validate_token() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("alice", "pass1234").unwrap();
    let (_, token) = auth.login("alice", "pass1234").unwrap();

    let user = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(user.username, "alice");

    assert!(auth.validate_token("invalid_token").unwrap().is_none());
}

#[test]
fn auth_logout() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("bob", "password").unwrap();
    let (_, token) = auth.login("bob", "password").unwrap();

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
}

#[test]
fn auth_registration_disabled() {
    let db = test_db();
    let auth = AuthService::new(db, 30, false);

    let result = auth.register("newuser", "password");
    assert!(result.is_err());
}

#[test]
fn auth_invalid_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("user", "correct").unwrap();
    let result = auth.login("user", "wrong");
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[test]
fn auth_change_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("user", "oldpass").unwrap();
    auth.change_password("user", "newpass").unwrap();

    assert!(auth.login("user", "oldpass").is_err());
    assert!(auth.login("user", "newpass").is_ok());
}

#[test]
fn auth_short_password_rejected() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let result = auth.create_user("user", "abc");
    assert!(result.is_err());
}

#[test]
fn auth_invalid_username_rejected() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    assert!(auth.create_user("user@email", "password").is_err());
    assert!(auth.create_user("user name", "password").is_err());
    assert!(auth.create_user("", "password").is_err());
}

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Shelf"

[database]
path = "/tmp/test.db"

[auth]
registration = "disabled"
session_days = 7

[storage]
uploads_dir = "/tmp/uploads"
max_upload_bytes = 1048576

[reader]
page_size = 500
max_cached_books = 4
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Shelf");
    assert!(!config.auth.registration_enabled());
    assert_eq!(config.auth.session_days, 7);
    assert_eq!(config.storage.max_upload_bytes, 1048576);
    assert_eq!(config.reader.page_size, 500);
    assert_eq!(config.reader.max_cached_books, 4);
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert!(config.auth.registration_enabled());
    assert_eq!(config.reader.page_size, reader::DEFAULT_PAGE_SIZE);
    assert_eq!(config.reader.max_cached_books, 32);
}

#[test]
fn state_owned_book_enforces_ownership() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    create_user(&state.db, "user-1", "alice");
    create_user(&state.db, "user-2", "bob");
    create_book(&state.db, "book-1", "user-1", "Alice's Book");

    let alice = state.db.get_user_by_id("user-1").unwrap().unwrap();
    let bob = state.db.get_user_by_id("user-2").unwrap().unwrap();

    assert!(state.owned_book(&alice, "book-1").is_ok());
    assert!(matches!(
        state.owned_book(&bob, "book-1"),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        state.owned_book(&alice, "missing"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn state_book_text_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let path = state.store_upload("book-1", SAMPLE_FB2.as_bytes()).unwrap();
    let book = Book {
        id: "book-1".to_string(),
        owner_id: "user-1".to_string(),
        title: "Степь".to_string(),
        author: None,
        path: path.to_string_lossy().to_string(),
        file_size: SAMPLE_FB2.len() as i64,
        created_at: now_timestamp(),
    };

    let first = state.book_text(&book).unwrap();
    let second = state.book_text(&book).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.starts_with("Из города выехала бричка."));
}

#[test]
fn state_remove_stored_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let path = state.store_upload("book-1", SAMPLE_FB2.as_bytes()).unwrap();
    let book = Book {
        id: "book-1".to_string(),
        owner_id: "user-1".to_string(),
        title: "Степь".to_string(),
        author: None,
        path: path.to_string_lossy().to_string(),
        file_size: 0,
        created_at: now_timestamp(),
    };

    state.remove_stored(&book).unwrap();
    assert!(!path.exists());

    // Removing again is not an error
    state.remove_stored(&book).unwrap();
}

#[test]
fn reading_flow_resumes_from_bookmark() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    create_user(&state.db, "user-1", "reader");
    let path = state.store_upload("book-1", SAMPLE_FB2.as_bytes()).unwrap();
    let book = Book {
        id: "book-1".to_string(),
        owner_id: "user-1".to_string(),
        title: "Степь".to_string(),
        author: None,
        path: path.to_string_lossy().to_string(),
        file_size: SAMPLE_FB2.len() as i64,
        created_at: now_timestamp(),
    };
    state.db.create_book(&book).unwrap();

    let text = state.book_text(&book).unwrap();
    let first = reader::paginate(&text, 0, 10);
    let next = first.next_position.unwrap();

    // The user advances: only now is the position persisted.
    state
        .db
        .save_bookmark(&Bookmark {
            user_id: "user-1".to_string(),
            book_id: "book-1".to_string(),
            position: next as i64,
            updated_at: now_timestamp(),
        })
        .unwrap();

    let saved = state.db.get_bookmark("user-1", "book-1").unwrap().unwrap();
    let resumed = reader::paginate(&text, saved.position as usize, 10);

    assert_eq!(
        format!("{}{}", first.content, resumed.content),
        text.chars().take(20).collect::<String>()
    );
}

#[test]
fn book_json_hides_storage_path() {
    let book = Book {
        id: "book-1".to_string(),
        owner_id: "user-1".to_string(),
        title: "Степь".to_string(),
        author: None,
        path: "/var/lib/fb2shelf/uploads/book-1.fb2".to_string(),
        file_size: 1024,
        created_at: now_timestamp(),
    };

    let value = serde_json::to_value(&book).unwrap();
    assert!(value.get("path").is_none());
    assert_eq!(value["title"], "Степь");
}

#[test]
fn user_json_hides_password_hash() {
    let user = User {
        id: "user-1".to_string(),
        username: "alice".to_string(),
        password_hash: "secret".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };

    let value = serde_json::to_value(&user).unwrap();
    assert!(value.get("password_hash").is_none());
}

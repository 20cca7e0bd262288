//! Error mapping as seen by a transport layer: status codes, error codes and
//! response bodies

mod bookstore_harness;

use bookstore_harness::*;
use serde_json::json;
use this_crud::prelude::*;

#[test]
fn test_already_exists_response() {
    let store = Bookstore::seeded();
    let err = store.authors.create(Author::new(10, "Again")).unwrap_err();

    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    let response = err.to_response();
    assert_eq!(response.code, "ENTITY_ALREADY_EXISTS");
    assert_eq!(
        response.details,
        Some(json!({ "entity_type": "author", "id": "10" }))
    );
}

#[test]
fn test_not_found_response() {
    let store = Bookstore::seeded();
    let err = store.books.get_by_id(&404).unwrap_err();

    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
    assert!(err.to_response().message.contains("404"));
}

#[test]
fn test_bad_request_family() {
    let store = Bookstore::seeded();

    let sort = store
        .books
        .fetch_all(&FetchRequest::new().sort("colorasc"))
        .unwrap_err();
    assert_eq!(sort.to_response().details, Some(json!({ "sort": "colorasc" })));

    let mut request = FetchRequest::new();
    request.count = Some(10);
    let page = store.books.fetch_all(&request).unwrap_err();
    assert_eq!(page.error_code(), "BAD_PAGINATION");
    assert_eq!(
        page.to_response().details,
        Some(json!({ "start": null, "count": 10 }))
    );

    let id = store.books.fetch_by_ids("1,x").unwrap_err();
    assert_eq!(id.error_code(), "BAD_ID");

    for err in [sort, page, id] {
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }
}

#[test]
fn test_hook_status_reaches_caller_verbatim() {
    let store = Bookstore::new();
    let authors = ServiceBuilder::<Author>::new("locked_author")
        .repository(store.author_store.clone())
        .hooks(|h| {
            h.pre_add(
                5,
                HookHandler::observe(|author: &Author| {
                    Err(HookError::status(
                        StatusCode::FORBIDDEN,
                        format!("{} may not be added", author.name),
                    ))
                }),
            );
        })
        .build()
        .unwrap();

    let err = authors.create(Author::new(1, "Mallory")).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(err.to_string(), "Mallory may not be added");
    assert_eq!(err.to_response().details, Some(json!({ "status": 403 })));
    assert!(!store.author_store.exists_by_id(&1).unwrap());
}

#[test]
fn test_unexpected_hook_failure_is_internal() {
    let store = Bookstore::new();
    let authors = ServiceBuilder::<Author>::new("flaky_author")
        .repository(store.author_store.clone())
        .hooks(|h| {
            h.post_add(
                2,
                HookHandler::observe(|_: &Author| Err(anyhow::anyhow!("search index offline").into())),
            );
        })
        .build()
        .unwrap();

    let err = authors.create(Author::new(1, "Alice")).unwrap_err();
    assert!(matches!(err, CrudError::Internal(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = err.to_response();
    assert_eq!(response.code, "INTERNAL_ERROR");
    assert!(!response.message.contains("search index"));

    // the row was saved before the post hook failed
    assert!(store.author_store.exists_by_id(&1).unwrap());
}

#[test]
fn test_duplicate_hook_order_fails_build() {
    let store = Bookstore::new();
    let result = ServiceBuilder::<Author>::new("author")
        .repository(store.author_store.clone())
        .hooks(|h| {
            h.pre_delete(3, HookHandler::observe(|_: &Author| Ok(())));
        })
        .hooks(|h| {
            h.pre_delete(3, HookHandler::observe(|_: &Author| Ok(())));
        })
        .build();

    let err = result.err().expect("duplicate order must fail");
    assert!(matches!(
        err,
        CrudError::DuplicateHookOrder {
            kind: HookKind::PreDelete,
            order: 3,
            ..
        }
    ));
    assert_eq!(err.error_code(), "DUPLICATE_HOOK_ORDER");
}

#[test]
fn test_missing_repository_is_a_config_error() {
    let result = ServiceBuilder::<Author>::new("orphan").build();
    let err = result.err().expect("repository is required");
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(err.to_string().contains("repository"));
    assert!(err.to_string().contains("orphan"));
}

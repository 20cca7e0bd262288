//! Shared bookstore fixture for service-level tests
//!
//! Provides three entities wired the way an application would wire them:
//!
//! - `Book` (scalar `i64` id) with pre/post add hooks that move the author
//!   list into `BookAuthor` rows, a post-fetch hook that loads it back, and
//!   title/date/author filters;
//! - `Author` whose pre-delete hook drops its `BookAuthor` rows and whose
//!   post-fetch hook computes `is_deletable`;
//! - `BookAuthor` with a composite `(book_id, author_id)` key.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod bookstore_harness;
//! use bookstore_harness::*;
//! ```

#![allow(dead_code)]

use std::sync::Mutex;
use this_crud::prelude::*;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub published: NaiveDate,
    pub tenant: String,
    /// Not stored on the row; carried through add hooks and refilled on fetch
    #[serde(default)]
    pub authors: Vec<i64>,
    #[serde(flatten)]
    pub deletable: Deletable,
}

impl_entity!(Book, "book", id: i64);
impl_merge!(Book, [title, published]);

impl Book {
    pub fn new(id: i64, title: &str, published: &str, tenant: &str, authors: &[i64]) -> Self {
        Self {
            id,
            title: title.to_string(),
            published: NaiveDate::parse_from_str(published, "%Y-%m-%d").expect("valid test date"),
            tenant: tenant.to_string(),
            authors: authors.to_vec(),
            deletable: Deletable::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub deletable: Deletable,
}

impl_entity!(Author, "author", id: i64);
impl_merge!(Author, [name]);

impl Author {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            deletable: Deletable::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookAuthor {
    pub book_id: i64,
    pub author_id: i64,
    #[serde(flatten)]
    pub deletable: Deletable,
}

impl BookAuthor {
    pub fn new(book_id: i64, author_id: i64) -> Self {
        Self {
            book_id,
            author_id,
            deletable: Deletable::default(),
        }
    }
}

impl Entity for BookAuthor {
    type Id = (i64, i64);

    fn entity_type() -> &'static str {
        "book_author"
    }

    fn id(&self) -> Self::Id {
        (self.book_id, self.author_id)
    }

    fn deletable(&self) -> &Deletable {
        &self.deletable
    }

    fn deletable_mut(&mut self) -> &mut Deletable {
        &mut self.deletable
    }
}

impl IdCodec for BookAuthor {
    fn id_field_count() -> usize {
        2
    }

    fn parts_to_id(parts: &[&str]) -> Result<Self::Id> {
        Ok((parse_id_part(parts, 0)?, parse_id_part(parts, 1)?))
    }
}

impl_merge!(BookAuthor, []);

// ---------------------------------------------------------------------------
// Journal of hook invocations
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

/// Books written by an author, resolved through the link store
pub struct AuthorFilter {
    links: Arc<InMemoryRepository<BookAuthor>>,
}

impl Filter<Book> for AuthorFilter {
    fn apply(&self, stream: EntityStream<Book>, value: &str) -> Result<EntityStream<Book>> {
        let author_id: i64 = value.trim().parse()?;
        let book_ids: Vec<i64> = self
            .links
            .find_where(|l| l.author_id == author_id && !l.is_deleted())?
            .into_iter()
            .map(|l| l.book_id)
            .collect();
        Ok(stream.filter(move |book| book_ids.contains(&book.id)))
    }
}

pub fn registry(links: Arc<InMemoryRepository<BookAuthor>>) -> ExtensionRegistry {
    ExtensionRegistry::builder()
        // book
        .filter::<Book, _, _>(FilterInfo::new("book", "title", Operation::Equals), || {
            FieldFilter::new(|b: &Book, v| b.title == v)
        })
        .filter::<Book, _, _>(
            FilterInfo::new("book", "published", Operation::DateBefore),
            || DateFilter::new(Operation::DateBefore, |b: &Book| b.published),
        )
        .filter::<Book, _, _>(
            FilterInfo::new("book", "published", Operation::DateAfter),
            || DateFilter::new(Operation::DateAfter, |b: &Book| b.published),
        )
        .filter::<Book, _, _>(FilterInfo::new("book", "author", Operation::Equals), move || {
            AuthorFilter {
                links: links.clone(),
            }
        })
        .sort::<Book, _, _>(SortInfo::new("book", "title", SortDirection::Asc), || {
            FieldSort::ascending(|b: &Book| b.title.clone())
        })
        .sort::<Book, _, _>(SortInfo::new("book", "title", SortDirection::Desc), || {
            FieldSort::descending(|b: &Book| b.title.clone())
        })
        .sort::<Book, _, _>(SortInfo::new("book", "published", SortDirection::Asc), || {
            FieldSort::ascending(|b: &Book| b.published)
        })
        // tenant-scoped books
        .filter::<Book, _, _>(
            FilterInfo::new("tenant_book", "tenant", Operation::Equals),
            || FieldFilter::new(|b: &Book, v| b.tenant == v).mandatory(),
        )
        .filter::<Book, _, _>(
            FilterInfo::new("tenant_book", "title", Operation::Equals),
            || FieldFilter::new(|b: &Book, v| b.title == v),
        )
        // author
        .filter::<Author, _, _>(FilterInfo::new("author", "name", Operation::Equals), || {
            FieldFilter::new(|a: &Author, v| a.name == v)
        })
        .sort::<Author, _, _>(SortInfo::new("author", "name", SortDirection::Asc), || {
            FieldSort::ascending(|a: &Author| a.name.clone())
        })
        // book_author
        .filter::<BookAuthor, _, _>(
            FilterInfo::new("book_author", "book", Operation::Equals),
            || {
                FieldFilter::new(|l: &BookAuthor, v| {
                    v.trim().parse::<i64>().is_ok_and(|id| l.book_id == id)
                })
            },
        )
        .build()
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

pub fn book_hooks(
    h: &mut HookDeclarations<Book>,
    links: Arc<InMemoryRepository<BookAuthor>>,
    journal: Journal,
) {
    {
        let journal = journal.clone();
        h.pre_add(
            1,
            HookHandler::transform(move |book: &mut Book| {
                journal.push("book:pre_add:1");
                Ok(HookValue::new(std::mem::take(&mut book.authors)))
            }),
        );
    }
    {
        let journal = journal.clone();
        let links = links.clone();
        h.post_add(
            1,
            HookHandler::apply(move |mut book: Book, authors| {
                journal.push("book:post_add:1");
                let authors = authors
                    .and_then(|v| v.downcast::<Vec<i64>>().ok())
                    .unwrap_or_default();
                for &author_id in &authors {
                    links.save(BookAuthor::new(book.id, author_id))?;
                }
                book.authors = authors;
                Ok(book)
            }),
        );
    }
    h.pre_edit(
        1,
        HookHandler::observe(|book: &Book| {
            if book.title.trim().is_empty() {
                return Err(HookError::status(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "title must not be empty",
                ));
            }
            Ok(())
        }),
    );
    {
        let journal = journal.clone();
        h.post_edit(
            1,
            HookHandler::observe(move |book: &Book| {
                journal.push(format!("book:post_edit:{}", book.id));
                Ok(())
            }),
        );
    }
    {
        let journal = journal.clone();
        let links = links.clone();
        h.post_delete(
            1,
            HookHandler::observe(move |book: &Book| {
                journal.push(format!("book:post_delete:{}", book.id));
                let book_id = book.id;
                links.remove_where(|l| l.book_id == book_id)?;
                Ok(())
            }),
        );
    }
    {
        let journal = journal.clone();
        h.pre_fetch(
            1,
            HookHandler::observe(move |filters: &FilterContainer| {
                journal.push(format!("book:pre_fetch:{}", filters.len()));
                Ok(())
            }),
        );
    }
    h.post_fetch(
        1,
        HookHandler::apply(move |mut fetched: FetchedRows<Book>, _| {
            journal.push(format!("book:post_fetch:{}", fetched.full_scan));
            for book in &mut fetched.rows {
                let book_id = book.id;
                book.authors = links
                    .find_where(|l| l.book_id == book_id && !l.is_deleted())?
                    .into_iter()
                    .map(|l| l.author_id)
                    .collect();
            }
            Ok(fetched)
        }),
    );
}

pub fn author_hooks(h: &mut HookDeclarations<Author>, links: Arc<InMemoryRepository<BookAuthor>>) {
    {
        let links = links.clone();
        h.pre_delete(
            1,
            HookHandler::observe(move |author: &Author| {
                let author_id = author.id;
                links.remove_where(|l| l.author_id == author_id)?;
                Ok(())
            }),
        );
    }
    h.post_fetch(
        1,
        HookHandler::apply(move |mut fetched: FetchedRows<Author>, _| {
            for author in &mut fetched.rows {
                let author_id = author.id;
                let linked = !links.find_where(|l| l.author_id == author_id)?.is_empty();
                author.set_deletable(!linked);
            }
            Ok(fetched)
        }),
    );
}

// ---------------------------------------------------------------------------
// Bookstore
// ---------------------------------------------------------------------------

pub struct Bookstore {
    pub books: CrudService<Book>,
    pub authors: CrudService<Author>,
    pub book_authors: CrudService<BookAuthor>,
    pub book_store: Arc<InMemoryRepository<Book>>,
    pub author_store: Arc<InMemoryRepository<Author>>,
    pub link_store: Arc<InMemoryRepository<BookAuthor>>,
    pub registry: Arc<ExtensionRegistry>,
    pub journal: Journal,
}

impl Bookstore {
    /// Empty bookstore with every operation enabled
    pub fn new() -> Self {
        Self::with_config(&ServicesConfig::default()).expect("bookstore services build")
    }

    pub fn with_config(config: &ServicesConfig) -> CrudResult<Self> {
        let _ = this_crud::logging::init_tracing("this_crud=debug");

        let book_store = Arc::new(InMemoryRepository::<Book>::new());
        let author_store = Arc::new(InMemoryRepository::<Author>::new());
        let link_store = Arc::new(InMemoryRepository::<BookAuthor>::new());
        let registry = Arc::new(registry(link_store.clone()));
        let journal = Journal::default();

        let books = ServiceBuilder::<Book>::new("book")
            .repository(book_store.clone())
            .extensions(registry.clone())
            .config(config)
            .hooks(|h| book_hooks(h, link_store.clone(), journal.clone()))
            .build()?;

        let authors = ServiceBuilder::<Author>::new("author")
            .repository(author_store.clone())
            .extensions(registry.clone())
            .config(config)
            .hooks(|h| author_hooks(h, link_store.clone()))
            .build()?;

        let book_authors = ServiceBuilder::<BookAuthor>::new("book_author")
            .repository(link_store.clone())
            .extensions(registry.clone())
            .config(config)
            .build()?;

        Ok(Self {
            books,
            authors,
            book_authors,
            book_store,
            author_store,
            link_store,
            registry,
            journal,
        })
    }

    /// Bookstore with three authors and five books, journal cleared
    pub fn seeded() -> Self {
        let store = Self::new();
        store.seed();
        store
    }

    pub fn seed(&self) {
        for author in [
            Author::new(10, "Frank Herbert"),
            Author::new(20, "Ursula K. Le Guin"),
            Author::new(30, "Iain M. Banks"),
        ] {
            self.authors.create(author).expect("seed author");
        }
        for book in [
            Book::new(1, "Dune", "1965-08-01", "acme", &[10]),
            Book::new(2, "The Left Hand of Darkness", "1969-03-01", "acme", &[20]),
            Book::new(3, "The Dispossessed", "1974-05-01", "globex", &[20]),
            Book::new(4, "Consider Phlebas", "1987-04-23", "globex", &[30]),
            Book::new(5, "Children of Dune", "1976-04-01", "acme", &[10]),
        ] {
            self.books.create(book).expect("seed book");
        }
        self.journal.clear();
    }

    /// Tenant-scoped book service over the same store
    ///
    /// With `injected`, a pre-fetch hook replaces any tenant filter with the
    /// given tenant.
    pub fn tenant_books(&self, injected: Option<&'static str>) -> CrudService<Book> {
        ServiceBuilder::<Book>::new("tenant_book")
            .repository(self.book_store.clone())
            .extensions(self.registry.clone())
            .hooks(|h| {
                if let Some(tenant) = injected {
                    h.pre_fetch(
                        1,
                        HookHandler::apply(move |mut filters: FilterContainer, _| {
                            filters.remove("tenant", "equals");
                            filters.push("tenant", "equals", tenant);
                            Ok(filters)
                        }),
                    );
                }
            })
            .build()
            .expect("tenant book service builds")
    }
}

/// Ids of fetched rows, in order
pub fn book_ids(books: &[Book]) -> Vec<i64> {
    books.iter().map(|b| b.id).collect()
}

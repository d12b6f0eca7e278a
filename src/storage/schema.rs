//! Database schema constants.
//!
//! All SQL schema definitions for the PostgreSQL backend, applied in order
//! by the migration runner.

/// SQL schema for creating the indicative_ratings table.
pub const CREATE_INDICATIVE_RATINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS indicative_ratings (
    id UUID PRIMARY KEY,
    description VARCHAR(4) NOT NULL UNIQUE,
    image_url VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the movies table.
pub const CREATE_MOVIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    indicative_rating_id UUID NOT NULL REFERENCES indicative_ratings(id),
    title VARCHAR(255) NOT NULL,
    duration_minutes INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ
)
"#;

/// SQL schema for creating the movie_images table.
pub const CREATE_MOVIE_IMAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS movie_images (
    id UUID PRIMARY KEY,
    movie_id UUID NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    image_url VARCHAR(1024) NOT NULL,
    external_id VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the ingest_events table.
///
/// No foreign key on movie_id: the audit stream outlives movie deletion.
pub const CREATE_INGEST_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_events (
    id UUID PRIMARY KEY,
    movie_id UUID NOT NULL,
    kind VARCHAR(32) NOT NULL,
    external_id VARCHAR(255),
    detail TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL for creating all required indexes.
pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_movies_user_id ON movies(user_id);
CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);
CREATE INDEX IF NOT EXISTS idx_movie_images_movie_id ON movie_images(movie_id);
CREATE INDEX IF NOT EXISTS idx_ingest_events_movie_id ON ingest_events(movie_id);
CREATE INDEX IF NOT EXISTS idx_ingest_events_created_at ON ingest_events(created_at)
"#;

/// Seed rows for the Brazilian indicative rating scale.
pub const SEED_INDICATIVE_RATINGS: &str = r#"
INSERT INTO indicative_ratings (id, description, image_url) VALUES
    ('0b51b0b5-7592-44e3-b60b-2b8be4f2e8aa', 'L',  'https://static.movie-pass.app/ratings/l.png'),
    ('9bd2a1a7-6c5b-4b86-9a1f-48cf52e0b0c1', '10', 'https://static.movie-pass.app/ratings/10.png'),
    ('3e7d2cbe-70b6-4fbc-94ce-7a74ef1e2f02', '12', 'https://static.movie-pass.app/ratings/12.png'),
    ('5a4a5a0d-04cd-4a0e-9b34-2b04fbb0a713', '14', 'https://static.movie-pass.app/ratings/14.png'),
    ('c6a46b43-21a2-4a98-8c43-2f9f8255a864', '16', 'https://static.movie-pass.app/ratings/16.png'),
    ('f0e79cde-6a9c-4d0f-9c40-04e35cf0a2fd', '18', 'https://static.movie-pass.app/ratings/18.png')
ON CONFLICT (description) DO NOTHING
"#;

/// Returns all schema creation statements in the correct order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_INDICATIVE_RATINGS_TABLE,
        CREATE_MOVIES_TABLE,
        CREATE_MOVIE_IMAGES_TABLE,
        CREATE_INGEST_EVENTS_TABLE,
        CREATE_INDEXES,
        SEED_INDICATIVE_RATINGS,
    ]
}

/// Table names in the schema.
pub mod tables {
    /// Indicative ratings table name.
    pub const INDICATIVE_RATINGS: &str = "indicative_ratings";
    /// Movies table name.
    pub const MOVIES: &str = "movies";
    /// Movie images table name.
    pub const MOVIE_IMAGES: &str = "movie_images";
    /// Ingest events table name.
    pub const INGEST_EVENTS: &str = "ingest_events";
}

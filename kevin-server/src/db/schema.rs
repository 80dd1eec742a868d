/// SQL schema for the sighting database
/// Creates all tables with proper constraints, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Posts table (sightings published by Kevin)
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_url TEXT NOT NULL,
    comment TEXT CHECK(comment IS NULL OR length(comment) <= 500),
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    created_at TEXT NOT NULL
);

-- Create index on created_at for efficient feed ordering
CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC);

-- Comments table
CREATE TABLE IF NOT EXISTS post_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    comment TEXT NOT NULL CHECK(length(comment) >= 1 AND length(comment) <= 500),
    created_at TEXT NOT NULL,
    client_token TEXT UNIQUE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_post_comments_post ON post_comments(post_id, created_at ASC);

-- Likes table: one row per (post, username)
CREATE TABLE IF NOT EXISTS post_likes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (post_id, username),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_post_likes_post ON post_likes(post_id);

-- Processed like toggles, keyed by the client's idempotency token
CREATE TABLE IF NOT EXISTS mutation_tokens (
    token TEXT PRIMARY KEY,
    post_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    liked INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Demo data for local development
/// - 3 sightings around Madrid, Lisbon and Mexico City
/// - A few comments from seekers
/// - Likes from ana and luis
pub const DEMO_DATA: &str = r#"
INSERT OR IGNORE INTO posts (id, image_url, comment, latitude, longitude, created_at) VALUES
    (1, 'https://picsum.photos/seed/kevin1/800/600', 'Probando churros en la Puerta del Sol', 40.4169, -3.7035, '2024-05-01T10:00:00+00:00'),
    (2, 'https://picsum.photos/seed/kevin2/800/600', 'Tranvía 28, no me busquéis', 38.7139, -9.1334, '2024-05-03T16:30:00+00:00'),
    (3, 'https://picsum.photos/seed/kevin3/800/600', NULL, 19.4326, -99.1332, '2024-05-07T21:15:00+00:00');

INSERT OR IGNORE INTO post_comments (id, post_id, username, comment, created_at) VALUES
    (1, 1, 'ana', '¡Te vi desde la fuente!', '2024-05-01T10:05:00+00:00'),
    (2, 1, 'luis', 'Guárdame uno', '2024-05-01T10:20:00+00:00'),
    (3, 2, 'marta', 'Eso es Alfama', '2024-05-03T17:00:00+00:00');

INSERT OR IGNORE INTO post_likes (id, post_id, username, created_at) VALUES
    (1, 1, 'ana', '2024-05-01T10:06:00+00:00'),
    (2, 1, 'luis', '2024-05-01T10:21:00+00:00'),
    (3, 3, 'ana', '2024-05-07T22:00:00+00:00');
"#;

//! SQL schema for the Genkai SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
///
/// Nullable seasons take part in uniqueness through `IFNULL(season, -1)`
/// expression indexes, since SQLite treats NULLs in a UNIQUE constraint as
/// distinct.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS resolver_mappings (
    service     TEXT NOT NULL,
    entity_kind TEXT NOT NULL,     -- 'translator' | 'translation' | 'title'
    external_id TEXT NOT NULL,
    internal_id TEXT NOT NULL,
    UNIQUE (service, entity_kind, external_id)
);

CREATE TABLE IF NOT EXISTS translators (
    translator_id TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    slug          TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS titles (
    title_id       TEXT PRIMARY KEY,
    slug           TEXT NOT NULL,
    name           TEXT NOT NULL,
    name_key       TEXT NOT NULL,  -- trimmed, lowercased name
    other_names    TEXT NOT NULL DEFAULT '[]',
    season         INTEGER,
    year           INTEGER,
    shikimori_id   INTEGER,
    title_type     TEXT,
    status         TEXT,
    age_rating     TEXT,
    source         TEXT,
    description    TEXT NOT NULL DEFAULT '',
    duration       INTEGER,
    total_episodes INTEGER,
    created_at     TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS titles_shikimori_idx
    ON titles (shikimori_id, IFNULL(season, -1))
    WHERE shikimori_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS titles_name_idx
    ON titles (name_key, IFNULL(season, -1))
    WHERE shikimori_id IS NULL;

CREATE TABLE IF NOT EXISTS tags (
    tag_id   TEXT PRIMARY KEY,
    kind     TEXT NOT NULL,        -- 'country' | 'genre' | 'studio'
    name     TEXT NOT NULL,
    name_key TEXT NOT NULL,
    slug     TEXT NOT NULL,
    UNIQUE (kind, name_key)
);

CREATE TABLE IF NOT EXISTS title_tags (
    title_id TEXT NOT NULL REFERENCES titles(title_id),
    tag_id   TEXT NOT NULL REFERENCES tags(tag_id),
    position INTEGER NOT NULL,
    PRIMARY KEY (title_id, tag_id)
);

CREATE TABLE IF NOT EXISTS translations (
    translation_id TEXT PRIMARY KEY,
    title_id       TEXT REFERENCES titles(title_id),
    translator_id  TEXT REFERENCES translators(translator_id),
    external_id    TEXT NOT NULL,
    service        TEXT NOT NULL,
    season         INTEGER,
    url            TEXT,
    is_other       INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS translations_key_idx
    ON translations (external_id, service, IFNULL(season, -1));

CREATE TABLE IF NOT EXISTS episodes (
    episode_id     TEXT PRIMARY KEY,
    translation_id TEXT NOT NULL REFERENCES translations(translation_id),
    number         INTEGER NOT NULL,
    name           TEXT NOT NULL DEFAULT '',
    url            TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (translation_id, number)
);

-- The ledger is append-only.
CREATE TABLE IF NOT EXISTS update_runs (
    update_id      TEXT PRIMARY KEY,
    kind           TEXT NOT NULL,  -- 'series' | 'movies'
    created_at     TEXT NOT NULL,
    without_errors INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS update_run_episodes (
    update_id  TEXT NOT NULL REFERENCES update_runs(update_id),
    episode_id TEXT NOT NULL REFERENCES episodes(episode_id),
    PRIMARY KEY (update_id, episode_id)
);

CREATE TABLE IF NOT EXISTS subscriptions (
    user_id       TEXT NOT NULL,
    title_id      TEXT NOT NULL REFERENCES titles(title_id),
    translator_id TEXT NOT NULL REFERENCES translators(translator_id),
    created_at    TEXT NOT NULL,
    UNIQUE (user_id, title_id, translator_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id   TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    notification_type INTEGER NOT NULL,
    episode_id        TEXT REFERENCES episodes(episode_id),
    seen              INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    UNIQUE (user_id, notification_type, episode_id)
);

CREATE TABLE IF NOT EXISTS push_endpoints (
    endpoint_id TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    endpoint    TEXT NOT NULL,
    p256dh      TEXT NOT NULL,
    auth        TEXT NOT NULL,
    device      TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS admission_counters (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS subscriptions_pair_idx   ON subscriptions(title_id, translator_id);
CREATE INDEX IF NOT EXISTS notifications_user_idx   ON notifications(user_id, created_at);
CREATE INDEX IF NOT EXISTS push_endpoints_user_idx  ON push_endpoints(user_id);
CREATE INDEX IF NOT EXISTS update_runs_created_idx  ON update_runs(created_at);

PRAGMA user_version = 1;
";

//! Initial migration: images and the dead-letter store.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS dead_letter_images CASCADE;
             DROP TABLE IF EXISTS images CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
-- Uploaded images. The blob itself lives on the remote store; this row is
-- the local bookkeeping record.
CREATE TABLE images (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id UUID NOT NULL,
    blob_id VARCHAR(128) NOT NULL,
    filename VARCHAR(255) NOT NULL,
    mime_type VARCHAR(100) NOT NULL,
    file_size BIGINT NOT NULL DEFAULT 0,
    -- 'failed' is the legacy terminal state; the reconciler sweeps such rows
    -- into dead_letter_images and never writes it anymore.
    delete_status VARCHAR(16) NOT NULL DEFAULT 'active'
        CHECK (delete_status IN ('active', 'pending', 'failed')),
    retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Index for the reconciliation snapshot (the hot query, once per minute)
CREATE INDEX idx_images_pending ON images(updated_at)
    WHERE delete_status = 'pending';

-- Index for the legacy sweep
CREATE INDEX idx_images_failed ON images(id)
    WHERE delete_status = 'failed';

-- Index for listing a user's images
CREATE INDEX idx_images_owner ON images(owner_id, created_at DESC);

-- Full snapshots of images whose deletion exhausted its retry budget, so an
-- operator can recover the record by hand. Keyed by the original image id so
-- the insert-then-delete move is idempotent.
CREATE TABLE dead_letter_images (
    id UUID PRIMARY KEY,
    owner_id UUID NOT NULL,
    blob_id VARCHAR(128) NOT NULL,
    filename VARCHAR(255) NOT NULL,
    mime_type VARCHAR(100) NOT NULL,
    file_size BIGINT NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    failed_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Index for the retention sweep
CREATE INDEX idx_dead_letter_images_failed_at ON dead_letter_images(failed_at);
";

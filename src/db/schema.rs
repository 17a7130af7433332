use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Profiles (people known by email; identity attached on first sign-in)
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            display_name TEXT,
            user_id TEXT UNIQUE,
            leaf_total INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Leads (write-once interest captures)
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            role TEXT NOT NULL CHECK (role IN ('WORK', 'LIFE')),
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- Work-interest form submissions
        CREATE TABLE IF NOT EXISTS work_forms (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            company TEXT,
            website TEXT,
            message TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('WORK', 'LIFE')),
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            goal_cents INTEGER NOT NULL DEFAULT 0,
            starts_at INTEGER,
            ends_at INTEGER,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tiers (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(campaign_id, title COLLATE NOCASE)
        );
        CREATE INDEX IF NOT EXISTS idx_tiers_campaign ON tiers(campaign_id);

        -- Pledges. A provider order or capture id maps to at most one row.
        CREATE TABLE IF NOT EXISTS pledges (
            id TEXT PRIMARY KEY,
            campaign_id TEXT REFERENCES campaigns(id),
            tier_id TEXT REFERENCES tiers(id),
            profile_id TEXT REFERENCES profiles(id),
            user_id TEXT,
            email TEXT,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            status TEXT NOT NULL CHECK (status IN
                ('intent', 'recorded', 'captured', 'paid', 'denied', 'refunded', 'reversed')),
            paypal_order_id TEXT UNIQUE,
            paypal_capture_id TEXT UNIQUE,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pledges_campaign_status ON pledges(campaign_id, status);
        CREATE INDEX IF NOT EXISTS idx_pledges_user ON pledges(user_id);

        -- Leaf ledger (append-only point awards)
        CREATE TABLE IF NOT EXISTS leaf_ledger (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id),
            event_type TEXT NOT NULL,
            leaf_delta INTEGER NOT NULL,
            reason TEXT NOT NULL,
            source_app TEXT NOT NULL DEFAULT 'fund',
            source TEXT,
            campaign_slug TEXT,
            external_id TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_leaf_ledger_profile ON leaf_ledger(profile_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_leaf_ledger_award
            ON leaf_ledger(profile_id, event_type, external_id) WHERE external_id IS NOT NULL;

        -- Every inbound webhook delivery, verified or not
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            event_type TEXT,
            resource_id TEXT,
            verified INTEGER NOT NULL,
            payload TEXT NOT NULL,
            received_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_resource ON webhook_events(source, resource_id);
        "#,
    )?;
    Ok(())
}

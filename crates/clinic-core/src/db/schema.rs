//! SQLite schema definition.

/// Complete database schema for the clinic.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Staff
-- ============================================================================

CREATE TABLE IF NOT EXISTS user_profiles (
    username TEXT PRIMARY KEY,
    role TEXT NOT NULL DEFAULT 'receptionist'
        CHECK (role IN ('admin', 'doctor', 'receptionist')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    document_number TEXT NOT NULL UNIQUE,
    birth_date TEXT,                             -- YYYY-MM-DD
    gender TEXT NOT NULL CHECK (gender IN ('male', 'female', 'other')),
    phone TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    email TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name);

CREATE TABLE IF NOT EXISTS medical_histories (
    patient_id TEXT PRIMARY KEY REFERENCES patients(id) ON DELETE CASCADE,
    allergies TEXT,
    pre_existing_conditions TEXT,
    current_medications TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    start_time TEXT NOT NULL,                    -- HH:MM
    end_time TEXT NOT NULL,                      -- HH:MM
    status TEXT NOT NULL DEFAULT 'scheduled',    -- scheduled, completed, cancelled, no_show
    appointment_type TEXT NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (end_time > start_time)
);

CREATE INDEX IF NOT EXISTS idx_appointments_patient_date ON appointments(patient_id, date);
CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date, start_time);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);

CREATE TABLE IF NOT EXISTS appointment_notes (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL REFERENCES appointments(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('created', 'edited', 'status_changed', 'manual')),
    body TEXT NOT NULL,
    author TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_notes_appointment ON appointment_notes(appointment_id, created_at);

-- ============================================================================
-- Inventory
-- ============================================================================

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS suppliers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contact TEXT,
    phone TEXT,
    email TEXT,
    address TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    supplier_id TEXT NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
    code TEXT UNIQUE,                            -- NULL only for rows awaiting backfill
    unit_price_cents INTEGER NOT NULL CHECK (unit_price_cents > 0),
    minimum_stock INTEGER NOT NULL DEFAULT 0 CHECK (minimum_stock >= 0),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Code is immutable once assigned
CREATE TRIGGER IF NOT EXISTS medicines_code_immutable BEFORE UPDATE OF code ON medicines
WHEN old.code IS NOT NULL AND (new.code IS NULL OR new.code <> old.code)
BEGIN
    SELECT RAISE(ABORT, 'Medicine code is immutable');
END;

-- FTS5 virtual table for medicine search
CREATE VIRTUAL TABLE IF NOT EXISTS medicines_fts USING fts5(
    name,
    description,
    code,
    content='medicines',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS medicines_ai AFTER INSERT ON medicines BEGIN
    INSERT INTO medicines_fts(rowid, name, description, code)
    VALUES (new.rowid, new.name, new.description, new.code);
END;

CREATE TRIGGER IF NOT EXISTS medicines_ad AFTER DELETE ON medicines BEGIN
    INSERT INTO medicines_fts(medicines_fts, rowid, name, description, code)
    VALUES ('delete', old.rowid, old.name, old.description, old.code);
END;

CREATE TRIGGER IF NOT EXISTS medicines_au AFTER UPDATE ON medicines BEGIN
    INSERT INTO medicines_fts(medicines_fts, rowid, name, description, code)
    VALUES ('delete', old.rowid, old.name, old.description, old.code);
    INSERT INTO medicines_fts(rowid, name, description, code)
    VALUES (new.rowid, new.name, new.description, new.code);
END;

CREATE TABLE IF NOT EXISTS inventory_lots (
    id TEXT PRIMARY KEY,
    medicine_id TEXT NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
    quantity INTEGER NOT NULL,
    expiration_date TEXT NOT NULL,               -- YYYY-MM-DD
    lot_number TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_lots_medicine ON inventory_lots(medicine_id);
CREATE INDEX IF NOT EXISTS idx_lots_expiration ON inventory_lots(expiration_date);

-- ============================================================================
-- Movement Ledger (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventory_movements (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,       -- ledger order
    id TEXT NOT NULL UNIQUE,
    medicine_id TEXT NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('entry', 'exit')),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    recorded_at TEXT NOT NULL,
    actor TEXT NOT NULL,
    description TEXT,
    prev_hash TEXT,                              -- entry_hash of previous row, NULL for first
    entry_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movements_medicine ON inventory_movements(medicine_id, kind);

CREATE TRIGGER IF NOT EXISTS inventory_movements_no_update BEFORE UPDATE ON inventory_movements
BEGIN
    SELECT RAISE(ABORT, 'Inventory movements are append-only');
END;
"#;

//! Registry of entities exposed to administrative tooling.
//!
//! A plain static table: adding an entity means adding a row here.

use serde::Serialize;

use crate::db::{Database, DbResult};

/// One admin-manageable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdminEntity {
    pub name: &'static str,
    pub table: &'static str,
    pub list_display: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    pub readonly_fields: &'static [&'static str],
}

pub const ADMIN_ENTITIES: &[AdminEntity] = &[
    AdminEntity {
        name: "user profile",
        table: "user_profiles",
        list_display: &["username", "role", "created_at"],
        search_fields: &["username"],
        readonly_fields: &["created_at", "updated_at"],
    },
    AdminEntity {
        name: "patient",
        table: "patients",
        list_display: &["first_name", "last_name", "document_number", "gender", "phone"],
        search_fields: &["first_name", "last_name", "document_number"],
        readonly_fields: &["created_at", "updated_at"],
    },
    AdminEntity {
        name: "medical history",
        table: "medical_histories",
        list_display: &["patient_id", "created_at", "updated_at"],
        search_fields: &["patient_id"],
        readonly_fields: &["created_at", "updated_at"],
    },
    AdminEntity {
        name: "appointment",
        table: "appointments",
        list_display: &["patient_id", "appointment_type", "reason", "date", "start_time", "status"],
        search_fields: &["reason"],
        readonly_fields: &["created_at", "updated_at"],
    },
    AdminEntity {
        name: "appointment note",
        table: "appointment_notes",
        list_display: &["appointment_id", "kind", "created_at"],
        search_fields: &["kind", "body"],
        readonly_fields: &["created_at"],
    },
    AdminEntity {
        name: "category",
        table: "categories",
        list_display: &["name", "description"],
        search_fields: &["name"],
        readonly_fields: &[],
    },
    AdminEntity {
        name: "supplier",
        table: "suppliers",
        list_display: &["name", "contact", "phone", "email"],
        search_fields: &["name", "contact"],
        readonly_fields: &[],
    },
    AdminEntity {
        name: "medicine",
        table: "medicines",
        list_display: &["name", "code", "category_id", "supplier_id", "unit_price_cents", "minimum_stock"],
        search_fields: &["name", "code"],
        readonly_fields: &["code"],
    },
    AdminEntity {
        name: "inventory lot",
        table: "inventory_lots",
        list_display: &["medicine_id", "quantity", "expiration_date", "lot_number"],
        search_fields: &["lot_number"],
        readonly_fields: &[],
    },
    AdminEntity {
        name: "inventory movement",
        table: "inventory_movements",
        list_display: &["medicine_id", "kind", "quantity", "recorded_at", "actor"],
        search_fields: &["actor"],
        readonly_fields: &["kind", "quantity", "recorded_at", "actor", "prev_hash", "entry_hash"],
    },
];

/// Look up an entity by name or table.
pub fn find_entity(name: &str) -> Option<&'static AdminEntity> {
    ADMIN_ENTITIES
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name) || e.table == name)
}

/// Row count per registered entity, in registry order.
pub fn entity_counts(db: &Database) -> DbResult<Vec<(&'static AdminEntity, i64)>> {
    ADMIN_ENTITIES
        .iter()
        .map(|entity| -> DbResult<_> { Ok((entity, db.count_rows(entity.table)?)) })
        .collect()
}

//! Role-based access control and staff profiles.
//!
//! Roles are hierarchical: every permission granted to a receptionist is
//! also granted to a doctor, and every doctor permission to an admin.

use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{Role, UserProfile};

/// Actions guarded by a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManagePatients,
    ManageAppointments,
    ViewInventory,
    ViewMedicalHistory,
    EditMedicalHistory,
    /// Record exit movements (dispense to patients)
    DispenseMedicine,
    /// Catalog, suppliers, categories, lots and stock entries
    ManageInventory,
    ManageUsers,
}

impl Permission {
    /// Lowest role holding this permission.
    pub fn minimum_role(&self) -> Role {
        match self {
            Permission::ManagePatients
            | Permission::ManageAppointments
            | Permission::ViewInventory => Role::Receptionist,
            Permission::ViewMedicalHistory
            | Permission::EditMedicalHistory
            | Permission::DispenseMedicine => Role::Doctor,
            Permission::ManageInventory | Permission::ManageUsers => Role::Admin,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Permission::ManagePatients => "manage patients",
            Permission::ManageAppointments => "manage appointments",
            Permission::ViewInventory => "view inventory",
            Permission::ViewMedicalHistory => "view medical histories",
            Permission::EditMedicalHistory => "edit medical histories",
            Permission::DispenseMedicine => "dispense medicine",
            Permission::ManageInventory => "manage inventory",
            Permission::ManageUsers => "manage users",
        }
    }
}

/// Whether a role holds a permission.
pub fn role_allows(role: Role, permission: Permission) -> bool {
    role >= permission.minimum_role()
}

/// Fail with `PermissionDenied` unless the user's role allows the action.
pub fn authorize(user: &UserProfile, permission: Permission) -> ClinicResult<()> {
    if role_allows(user.role, permission) {
        Ok(())
    } else {
        tracing::warn!(
            username = %user.username,
            role = user.role.as_str(),
            action = permission.describe(),
            "permission denied"
        );
        Err(ClinicError::PermissionDenied {
            username: user.username.clone(),
            action: permission.describe().to_string(),
        })
    }
}

/// Staff profiles and their roles.
pub struct StaffDirectory<'a> {
    db: &'a Database,
}

impl<'a> StaffDirectory<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Resolve the acting username to its profile.
    pub fn resolve(&self, username: &str) -> ClinicResult<UserProfile> {
        self.db
            .get_user(username.trim())?
            .ok_or_else(|| ClinicError::NotFound(format!("user {}", username)))
    }

    /// Create the first admin. Only allowed while no profile exists.
    pub fn bootstrap_admin(&self, username: &str) -> ClinicResult<UserProfile> {
        let tx = self.db.begin_immediate()?;
        if self.db.count_rows("user_profiles")? > 0 {
            return Err(ClinicError::InvalidInput(
                "staff profiles already exist; add users as an admin".into(),
            ));
        }
        let user = self.insert(username, Role::Admin)?;
        tx.commit()?;
        tracing::info!(username = %user.username, "bootstrap admin created");
        Ok(user)
    }

    pub fn create(&self, actor: &UserProfile, username: &str, role: Role) -> ClinicResult<UserProfile> {
        authorize(actor, Permission::ManageUsers)?;
        let user = self.insert(username, role)?;
        tracing::info!(username = %user.username, role = role.as_str(), "user created");
        Ok(user)
    }

    pub fn set_role(&self, actor: &UserProfile, username: &str, role: Role) -> ClinicResult<UserProfile> {
        authorize(actor, Permission::ManageUsers)?;
        if !self.db.update_user_role(username, role)? {
            return Err(ClinicError::NotFound(format!("user {}", username)));
        }
        tracing::info!(username, role = role.as_str(), "user role changed");
        self.resolve(username)
    }

    pub fn delete(&self, actor: &UserProfile, username: &str) -> ClinicResult<()> {
        authorize(actor, Permission::ManageUsers)?;
        if actor.username == username {
            return Err(ClinicError::InvalidInput("users cannot delete themselves".into()));
        }
        if !self.db.delete_user(username)? {
            return Err(ClinicError::NotFound(format!("user {}", username)));
        }
        Ok(())
    }

    pub fn list(&self) -> ClinicResult<Vec<UserProfile>> {
        Ok(self.db.list_users()?)
    }

    fn insert(&self, username: &str, role: Role) -> ClinicResult<UserProfile> {
        let username = username.trim();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(ClinicError::InvalidInput(format!("invalid username {:?}", username)));
        }
        let user = UserProfile::new(username.to_string(), role);
        self.db.insert_user(&user).map_err(|e| {
            if e.is_unique_violation() {
                ClinicError::InvalidInput(format!("user {} already exists", username))
            } else {
                e.into()
            }
        })?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receptionist_permissions() {
        let role = Role::Receptionist;
        assert!(role_allows(role, Permission::ManagePatients));
        assert!(role_allows(role, Permission::ManageAppointments));
        assert!(role_allows(role, Permission::ViewInventory));
        assert!(!role_allows(role, Permission::ViewMedicalHistory));
        assert!(!role_allows(role, Permission::DispenseMedicine));
        assert!(!role_allows(role, Permission::ManageInventory));
    }

    #[test]
    fn test_doctor_permissions() {
        let role = Role::Doctor;
        assert!(role_allows(role, Permission::ManageAppointments));
        assert!(role_allows(role, Permission::EditMedicalHistory));
        assert!(role_allows(role, Permission::DispenseMedicine));
        assert!(!role_allows(role, Permission::ManageInventory));
        assert!(!role_allows(role, Permission::ManageUsers));
    }

    #[test]
    fn test_admin_has_everything() {
        for permission in [
            Permission::ManagePatients,
            Permission::ManageAppointments,
            Permission::ViewInventory,
            Permission::ViewMedicalHistory,
            Permission::EditMedicalHistory,
            Permission::DispenseMedicine,
            Permission::ManageInventory,
            Permission::ManageUsers,
        ] {
            assert!(role_allows(Role::Admin, permission));
        }
    }

    #[test]
    fn test_authorize_error_message() {
        let user = UserProfile::new("luis".into(), Role::Receptionist);
        let err = authorize(&user, Permission::ManageInventory).unwrap_err();
        assert_eq!(err.to_string(), "User luis is not allowed to manage inventory");
    }

    #[test]
    fn test_bootstrap_only_once() {
        let db = Database::open_in_memory().unwrap();
        let staff = StaffDirectory::new(&db);

        let admin = staff.bootstrap_admin("admin").unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(staff.bootstrap_admin("otro").is_err());
    }

    #[test]
    fn test_user_management() {
        let db = Database::open_in_memory().unwrap();
        let staff = StaffDirectory::new(&db);
        let admin = staff.bootstrap_admin("admin").unwrap();

        let luis = staff.create(&admin, "luis", Role::Receptionist).unwrap();
        assert!(matches!(
            staff.create(&luis, "maria", Role::Doctor),
            Err(ClinicError::PermissionDenied { .. })
        ));
        assert!(staff.create(&admin, "luis", Role::Doctor).is_err());
        assert!(staff.create(&admin, "two words", Role::Doctor).is_err());

        let promoted = staff.set_role(&admin, "luis", Role::Doctor).unwrap();
        assert_eq!(promoted.role, Role::Doctor);
        assert_eq!(staff.resolve("luis").unwrap().role, Role::Doctor);

        assert!(staff.delete(&admin, "admin").is_err());
        staff.delete(&admin, "luis").unwrap();
        assert!(matches!(staff.resolve("luis"), Err(ClinicError::NotFound(_))));
        assert_eq!(staff.list().unwrap().len(), 1);
    }
}

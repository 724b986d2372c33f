use crate::cli::CliAuthTokenKey;
use crate::data_store::{EnumMemberNotExistingError, StoreError, UserId};
use diesel::deserialize::FromSql;
use diesel::query_builder::bind_collector::RawBytesBindCollector;
use diesel::serialize::ToSql;
use diesel::{AsExpression, FromSqlRow};

/// Authorization token for accessing the data_store
///
/// The AuthToken holds the authenticated user (if any) and their [AccessRole]s, which imply
/// specific [Privilege]s.
///
/// This structure is our main protection against accidental unauthorized-access bugs: All
/// data_store access functions that are not public require an AuthToken and check it for the
/// required privilege. An AuthToken can only be created by
/// [crate::data_store::ClassyStoreFacade::get_auth_token_for_session], based on a valid session of
/// a logged-in user, and by cli functions via [AuthToken::create_for_cli].
#[derive(Debug, Clone)]
pub struct AuthToken {
    user_id: Option<UserId>,
    roles: Vec<AccessRole>,
}

impl AuthToken {
    /// Create a new AuthToken for the user of a client session.
    ///
    /// This function must only be used by implementations of
    /// [crate::data_store::ClassyStoreFacade::get_auth_token_for_session] after checking the
    /// validity of the client's session!
    pub(super) fn create_for_session(user_id: UserId, role: AccessRole) -> Self {
        AuthToken {
            user_id: Some(user_id),
            roles: vec![role],
        }
    }

    /// Create a new AuthToken for a command line interface functionality.
    ///
    /// The AuthToken is created with the AccessRole::Admin and without an associated user.
    ///
    /// This function must only be used by command line interface functions, not in the context of
    /// the web server!
    pub fn create_for_cli(_key: &CliAuthTokenKey) -> Self {
        AuthToken {
            user_id: None,
            roles: vec![AccessRole::Admin],
        }
    }

    /// The id of the authenticated user, or None for the command line interface.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Check if the AuthToken authorizes for the given `privilege`.
    ///
    /// The actual authorization check is delegated to [Privilege::qualifying_roles], by checking if
    /// any of the roles contained in the AuthToken qualifies.
    pub fn has_privilege(&self, privilege: Privilege) -> bool {
        privilege
            .qualifying_roles()
            .iter()
            .any(|role| self.roles.contains(role))
    }

    /// Check if the AuthToken authorizes for the given `privilege`. If not, return an appropriate
    /// PermissionDenied error.
    pub fn check_privilege(&self, privilege: Privilege) -> Result<(), StoreError> {
        if self.has_privilege(privilege) {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied {
                required_privilege: privilege,
            })
        }
    }

    /// Check if the authenticated user is the owner of some data (i.e. `owner` is their user id).
    /// Otherwise, `privilege` is required.
    pub fn check_owner_or_privilege(
        &self,
        owner: Option<UserId>,
        privilege: Privilege,
    ) -> Result<(), StoreError> {
        if owner.is_some() && owner == self.user_id {
            Ok(())
        } else {
            self.check_privilege(privilege)
        }
    }
}

/// Possible roles of a user.
///
/// Each role qualifies for a set of [Privilege]s. See [Privilege::qualifying_roles].
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, FromSqlRow, AsExpression)]
#[diesel(sql_type = diesel::sql_types::Integer)]
#[repr(i32)]
pub enum AccessRole {
    Student = 1,
    Teacher = 2,
    Admin = 3,
}

impl TryFrom<i32> for AccessRole {
    type Error = EnumMemberNotExistingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccessRole::Student),
            2 => Ok(AccessRole::Teacher),
            3 => Ok(AccessRole::Admin),
            value => Err(EnumMemberNotExistingError {
                member_value: value,
                enum_name: "AccessRole",
            }),
        }
    }
}

impl From<AccessRole> for i32 {
    fn from(value: AccessRole) -> Self {
        value as i32
    }
}

impl From<AccessRole> for classy_api_types::UserRole {
    fn from(value: AccessRole) -> Self {
        match value {
            AccessRole::Student => classy_api_types::UserRole::Student,
            AccessRole::Teacher => classy_api_types::UserRole::Teacher,
            AccessRole::Admin => classy_api_types::UserRole::Admin,
        }
    }
}

impl From<classy_api_types::UserRole> for AccessRole {
    fn from(value: classy_api_types::UserRole) -> Self {
        match value {
            classy_api_types::UserRole::Student => AccessRole::Student,
            classy_api_types::UserRole::Teacher => AccessRole::Teacher,
            classy_api_types::UserRole::Admin => AccessRole::Admin,
        }
    }
}

impl AccessRole {
    pub fn name(&self) -> &'static str {
        match self {
            AccessRole::Student => "Student",
            AccessRole::Teacher => "Teacher",
            AccessRole::Admin => "Admin",
        }
    }
}

impl std::str::FromStr for AccessRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" | "alumno" => Ok(AccessRole::Student),
            "teacher" | "profesor" => Ok(AccessRole::Teacher),
            "admin" => Ok(AccessRole::Admin),
            _ => Err(format!(
                "'{}' is not a valid role. Possible values: student, teacher, admin",
                s
            )),
        }
    }
}

impl<DB> ToSql<diesel::sql_types::Integer, DB> for AccessRole
where
    DB: diesel::backend::Backend,
    for<'c> DB: diesel::backend::Backend<BindCollector<'c> = RawBytesBindCollector<DB>>,
    i32: ToSql<diesel::sql_types::Integer, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        let value: i32 = (*self).into();
        value.to_sql(&mut out.reborrow())
    }
}

impl<DB> FromSql<diesel::sql_types::Integer, DB> for AccessRole
where
    DB: diesel::backend::Backend,
    i32: FromSql<diesel::sql_types::Integer, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let x = i32::from_sql(bytes)?;
        x.try_into()
            .map_err(|e: EnumMemberNotExistingError| e.to_string().into())
    }
}

/// Enum of available authorization privileges.
///
/// Each data_store action and web endpoint typically requires a single privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    ShowInventory,
    ShowReservations,
    BookForSelf,
    ManageAllReservations,
    ManageInventory,
    ManageUsers,
}

impl Privilege {
    /// Get the list of user [AccessRole]s that qualify for this privilege. Each returned role is
    /// individually sufficient for the privilege.
    ///
    /// This is function is our source of truth for authorization!
    pub fn qualifying_roles(&self) -> &'static [AccessRole] {
        match self {
            Privilege::ShowInventory => &[AccessRole::Student, AccessRole::Teacher, AccessRole::Admin],
            Privilege::ShowReservations => {
                &[AccessRole::Student, AccessRole::Teacher, AccessRole::Admin]
            }
            Privilege::BookForSelf => &[AccessRole::Student, AccessRole::Teacher, AccessRole::Admin],
            Privilege::ManageAllReservations => &[AccessRole::Admin],
            Privilege::ManageInventory => &[AccessRole::Admin],
            Privilege::ManageUsers => &[AccessRole::Admin],
        }
    }
}

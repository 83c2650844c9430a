use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub password: String,
    pub password_confirmation: String,
}

pub trait UserRepository {
    /// Store a new account. Fails if the username exists or the passwords
    /// differ.
    fn register_user(&self, user: NewUser) -> impl Future<Output = anyhow::Result<User>>;
    fn get_user(&self, username: &str) -> impl Future<Output = anyhow::Result<Option<User>>>;
    /// The matching user if `password` is correct, `None` otherwise
    fn verify_user(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn list_users(&self) -> impl Future<Output = anyhow::Result<Vec<User>>>;
}

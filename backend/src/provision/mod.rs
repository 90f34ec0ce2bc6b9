//! Remote schema provisioning and bootstrap accounts.

use crate::backend::Backend;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::remote::{ClientError, SqlClient, Statement};

/// Collections every backend must provide.
pub const COLLECTIONS: [&str; 4] = ["users", "quizzes", "logs", "settings"];

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT UNIQUE,
        password TEXT,
        role TEXT,
        credits INTEGER,
        is_active BOOLEAN
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        title TEXT,
        subject TEXT,
        level TEXT,
        grade TEXT,
        topic TEXT,
        data TEXT,
        created_by TEXT,
        created_at TEXT,
        status TEXT,
        is_public BOOLEAN
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS logs (
        id TEXT PRIMARY KEY,
        action TEXT,
        details TEXT,
        type TEXT,
        user_id TEXT,
        timestamp INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        id TEXT PRIMARY KEY,
        data TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_quizzes_created_by ON quizzes(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_quizzes_created_at ON quizzes(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp)",
];

/// Create any missing tables and indexes. Safe to run on every connection.
pub async fn ensure_schema(client: &dyn SqlClient) -> Result<(), ClientError> {
    for ddl in SCHEMA {
        client.execute(Statement::new(*ddl)).await.map_err(|e| {
            tracing::error!("Schema provisioning failed: {}", e);
            e
        })?;
    }
    tracing::debug!("Remote schema ready: {}", COLLECTIONS.join(", "));
    Ok(())
}

/// Id of the bootstrap administrator. This account cannot be deleted or deactivated.
pub const SEED_ADMIN_ID: &str = "1";
pub const SEED_ADMIN_USERNAME: &str = "hairi";
pub const SEED_TEACHER_ID: &str = "2";
pub const SEED_TEACHER_USERNAME: &str = "guru123";

/// A bootstrap account.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub user: User,
    pub password: String,
}

impl SeedAccount {
    pub fn new(id: &str, username: &str, password: &str, role: Role, credits: u32) -> Self {
        Self {
            user: User {
                id: id.to_string(),
                username: username.to_string(),
                role,
                credits,
                is_active: true,
            },
            password: password.to_string(),
        }
    }
}

/// The administrator and teacher accounts every fresh store starts with.
pub fn bootstrap_accounts(admin_password: &str, teacher_password: &str) -> Vec<SeedAccount> {
    vec![
        SeedAccount::new(
            SEED_ADMIN_ID,
            SEED_ADMIN_USERNAME,
            admin_password,
            Role::Admin,
            9999,
        ),
        SeedAccount::new(
            SEED_TEACHER_ID,
            SEED_TEACHER_USERNAME,
            teacher_password,
            Role::Teacher,
            50,
        ),
    ]
}

/// Insert each seed account whose username is not yet taken.
pub async fn ensure_seed(backend: &dyn Backend, seeds: &[SeedAccount]) -> Result<(), AppError> {
    for seed in seeds {
        if backend
            .find_user_by_username(&seed.user.username)
            .await?
            .is_some()
        {
            continue;
        }
        backend.insert_user(&seed.user, &seed.password).await?;
        tracing::info!(
            "Seeded {} account {:?} on {} backend",
            seed.user.role.as_str(),
            seed.user.username,
            backend.status()
        );
    }
    Ok(())
}

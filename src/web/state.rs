use std::{env, sync::Arc};

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use crate::{authz, chat::ChatClient};

pub const DEFAULT_STORAGE_ROOT: &str = "storage/uploads";

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    chat: ChatClient,
    jwt_secret: Arc<str>,
    storage_root: Arc<str>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET env var is missing")?;
        let storage_root =
            env::var("STORAGE_ROOT").unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.to_string());

        let chat = ChatClient::from_env().context("failed to initialize chat client")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        Ok(Self {
            pool,
            chat,
            jwt_secret: jwt_secret.into(),
            storage_root: storage_root.into(),
        })
    }

    /// Seed the default admin account and promote any pre-existing professor
    /// whose email sits on the admin allowlist but still carries the old
    /// default role.
    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let promoted = sqlx::query(
            "UPDATE professors SET role = $1, updated_at = NOW()
             WHERE email = ANY($2) AND role <> $1",
        )
        .bind(authz::ROLE_ADMIN)
        .bind(authz::ADMIN_EMAIL_ALLOWLIST)
        .execute(&self.pool)
        .await
        .context("failed to promote allowlisted admins")?;

        if promoted.rows_affected() > 0 {
            info!(
                promoted = promoted.rows_affected(),
                "promoted allowlisted professors to admin role"
            );
        }

        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM professors WHERE role = $1)")
                .bind(authz::ROLE_ADMIN)
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if !has_admin {
            let password_hash = crate::web::auth::hash_password("admin1")
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            sqlx::query(
                "INSERT INTO professors (id, name, email, password_hash, department, role)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind("Administrador")
            .bind("admin1@admin1.com")
            .bind(password_hash)
            .bind("Administración")
            .bind(authz::ROLE_ADMIN)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin professor")?;

            info!("Seeded default admin 'admin1@admin1.com'. Change its password promptly.");
        }

        Ok(())
    }

    pub fn chat_client(&self) -> ChatClient {
        self.chat.clone()
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn storage_root(&self) -> &str {
        &self.storage_root
    }
}

//! Credential store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist principals and enforce unique handles.
//! - Offer the atomic "insert and decide bootstrap role" operation.
//!
//! # Invariants
//! - `handle` is unique (`UNIQUE` column constraint).
//! - `create_with_bootstrap_role` grants `admin` to at most one principal:
//!   the one inserted into an empty table.

use crate::db::SharedConnection;
use crate::model::id::PrincipalId;
use crate::model::principal::{Principal, Role};
use crate::repo::{ensure_connection_ready, is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

const PRINCIPAL_SELECT_SQL: &str = "SELECT id, handle, password_hash, role FROM principals";

/// Credential store interface.
pub trait PrincipalRepository: Send + Sync {
    /// Inserts `principal` as given. Fails with `DuplicateHandle` when taken.
    fn create(&self, principal: &Principal) -> RepoResult<PrincipalId>;

    /// Inserts `principal`, ignoring its `role`: the stored role is `admin`
    /// when the store held no principals at insert time, `user` otherwise.
    /// Count and insert happen as one indivisible step.
    fn create_with_bootstrap_role(&self, principal: &Principal) -> RepoResult<Principal>;

    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Principal>>;
    fn find_by_id(&self, id: PrincipalId) -> RepoResult<Option<Principal>>;

    /// Replaces stored fields for `principal.id`. `NotFound` if absent.
    fn update(&self, principal: &Principal) -> RepoResult<()>;

    fn count(&self) -> RepoResult<u64>;
}

impl<R: PrincipalRepository + ?Sized> PrincipalRepository for Arc<R> {
    fn create(&self, principal: &Principal) -> RepoResult<PrincipalId> {
        (**self).create(principal)
    }

    fn create_with_bootstrap_role(&self, principal: &Principal) -> RepoResult<Principal> {
        (**self).create_with_bootstrap_role(principal)
    }

    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Principal>> {
        (**self).find_by_handle(handle)
    }

    fn find_by_id(&self, id: PrincipalId) -> RepoResult<Option<Principal>> {
        (**self).find_by_id(id)
    }

    fn update(&self, principal: &Principal) -> RepoResult<()> {
        (**self).update(principal)
    }

    fn count(&self) -> RepoResult<u64> {
        (**self).count()
    }
}

/// SQLite-backed credential store.
pub struct SqlitePrincipalRepository {
    conn: SharedConnection,
}

impl SqlitePrincipalRepository {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: SharedConnection) -> RepoResult<Self> {
        ensure_connection_ready(&conn.lock(), &["principals"])?;
        Ok(Self { conn })
    }
}

impl PrincipalRepository for SqlitePrincipalRepository {
    fn create(&self, principal: &Principal) -> RepoResult<PrincipalId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO principals (id, handle, password_hash, role)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                principal.id.to_hex(),
                principal.handle.as_str(),
                principal.password_hash.as_str(),
                principal.role.as_str(),
            ],
        )
        .map_err(|err| map_write_error(err, &principal.handle))?;

        Ok(principal.id)
    }

    fn create_with_bootstrap_role(&self, principal: &Principal) -> RepoResult<Principal> {
        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front, so other connections to the
        // same file cannot interleave between the emptiness check and insert.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO principals (id, handle, password_hash, role)
             SELECT ?1, ?2, ?3,
                    CASE WHEN EXISTS (SELECT 1 FROM principals) THEN 'user' ELSE 'admin' END;",
            params![
                principal.id.to_hex(),
                principal.handle.as_str(),
                principal.password_hash.as_str(),
            ],
        )
        .map_err(|err| map_write_error(err, &principal.handle))?;

        let stored = tx.query_row(
            &format!("{PRINCIPAL_SELECT_SQL} WHERE id = ?1;"),
            [principal.id.to_hex()],
            |row| Ok(parse_principal_row(row)),
        )??;
        tx.commit()?;

        Ok(stored)
    }

    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Principal>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{PRINCIPAL_SELECT_SQL} WHERE handle = ?1;"),
            [handle],
            |row| Ok(parse_principal_row(row)),
        )
        .optional()?
        .transpose()
    }

    fn find_by_id(&self, id: PrincipalId) -> RepoResult<Option<Principal>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{PRINCIPAL_SELECT_SQL} WHERE id = ?1;"),
            [id.to_hex()],
            |row| Ok(parse_principal_row(row)),
        )
        .optional()?
        .transpose()
    }

    fn update(&self, principal: &Principal) -> RepoResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE principals
                 SET
                    handle = ?1,
                    password_hash = ?2,
                    role = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?4;",
                params![
                    principal.handle.as_str(),
                    principal.password_hash.as_str(),
                    principal.role.as_str(),
                    principal.id.to_hex(),
                ],
            )
            .map_err(|err| map_write_error(err, &principal.handle))?;

        if changed == 0 {
            return Err(RepoError::NotFound(principal.id.to_hex()));
        }
        Ok(())
    }

    fn count(&self) -> RepoResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM principals;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative principal count {count}")))
    }
}

fn map_write_error(err: rusqlite::Error, handle: &str) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::DuplicateHandle(handle.to_string())
    } else {
        err.into()
    }
}

fn parse_principal_row(row: &Row<'_>) -> RepoResult<Principal> {
    let id_text: String = row.get("id")?;
    let id = PrincipalId::parse_hex(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid id `{id_text}` in principals.id")))?;

    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in principals.role"))
    })?;

    Ok(Principal {
        id,
        handle: row.get("handle")?,
        password_hash: row.get("password_hash")?,
        role,
    })
}

//! PostgreSQL implementation of OrganizationRepository.
//!
//! Personal organizations are unique per user and memberships unique per
//! `(organization, user)`; both constraints turn concurrent find-or-create
//! races into `InsertOutcome::Duplicate`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, MembershipId, OrganizationId, Timestamp, UserId,
};
use crate::domain::organization::{MemberRole, Organization, OrganizationMembership};
use crate::ports::{InsertOutcome, OrganizationRepository};

/// PostgreSQL implementation of the OrganizationRepository port.
pub struct PostgresOrganizationRepository {
    pool: PgPool,
}

impl PostgresOrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    personal_for_user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: OrganizationId::from_uuid(row.id),
            name: row.name,
            personal_for_user_id: row.personal_for_user_id.map(UserId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    organization_id: Uuid,
    user_id: Uuid,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for OrganizationMembership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let role = parse_role(&row.role)?;
        Ok(OrganizationMembership {
            id: MembershipId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            user_id: UserId::from_uuid(row.user_id),
            role,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn parse_role(s: &str) -> Result<MemberRole, DomainError> {
    match s {
        "learner" => Ok(MemberRole::Learner),
        "owner" => Ok(MemberRole::Owner),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid member role value: {}", other),
        )),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

fn db_error(context: &str, error: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, error))
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    async fn find_personal_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Organization>, DomainError> {
        let row: Option<OrganizationRow> = sqlx::query_as(
            "SELECT id, name, personal_for_user_id, created_at FROM organizations \
             WHERE personal_for_user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find personal organization", e))?;

        Ok(row.map(Organization::from))
    }

    async fn insert_organization(
        &self,
        organization: &Organization,
    ) -> Result<InsertOutcome<Organization>, DomainError> {
        let result = sqlx::query(
            "INSERT INTO organizations (id, name, personal_for_user_id, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(organization.id.as_uuid())
        .bind(&organization.name)
        .bind(organization.personal_for_user_id.map(|u| *u.as_uuid()))
        .bind(organization.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(organization.clone())),
            Err(e) if is_unique_violation(&e) => {
                let user_id = organization.personal_for_user_id.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Duplicate insert for a non-personal organization",
                    )
                })?;
                let winner = self.find_personal_for_user(&user_id).await?.ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        "Duplicate insert reported but no organization row found",
                    )
                })?;
                Ok(InsertOutcome::Duplicate(winner))
            }
            Err(e) => Err(db_error("Failed to insert organization", e)),
        }
    }

    async fn find_membership(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMembership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            "SELECT id, organization_id, user_id, role, created_at \
             FROM organization_memberships \
             WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find membership", e))?;

        row.map(OrganizationMembership::try_from).transpose()
    }

    async fn insert_membership(
        &self,
        membership: &OrganizationMembership,
    ) -> Result<InsertOutcome<OrganizationMembership>, DomainError> {
        let result = sqlx::query(
            "INSERT INTO organization_memberships (id, organization_id, user_id, role, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(membership.id.as_uuid())
        .bind(membership.organization_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(membership.created_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(membership.clone())),
            Err(e) if is_unique_violation(&e) => {
                let winner = self
                    .find_membership(&membership.organization_id, &membership.user_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::new(
                            ErrorCode::DatabaseError,
                            "Duplicate insert reported but no membership row found",
                        )
                    })?;
                Ok(InsertOutcome::Duplicate(winner))
            }
            Err(e) => Err(db_error("Failed to insert membership", e)),
        }
    }
}

//! Mirrors identity-provider users and sessions into local tables.

use crate::{
    db::DbPool,
    entities::{session_log, user_profile},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Envelope of every identity webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// What a processed event did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    ProfileUpserted,
    ProfileDeleted { removed: u64 },
    SessionLogged,
    Ignored,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct DeletedData {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    id: String,
    user_id: String,
}

#[derive(Clone)]
pub struct IdentityService {
    db_pool: Arc<DbPool>,
}

impl IdentityService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<IdentityOutcome, ServiceError> {
        match event.event_type.as_str() {
            "user.created" | "user.updated" => {
                let user: UserData = parse_data(event.data)?;
                self.upsert_profile(user).await?;
                Ok(IdentityOutcome::ProfileUpserted)
            }
            "user.deleted" => {
                let deleted: DeletedData = parse_data(event.data)?;
                match deleted.id {
                    Some(id) => {
                        let removed = self.delete_profile(&id).await?;
                        Ok(IdentityOutcome::ProfileDeleted { removed })
                    }
                    None => {
                        warn!("user.deleted without a user id");
                        Ok(IdentityOutcome::Ignored)
                    }
                }
            }
            "session.ended" => {
                let session: SessionData = parse_data(event.data)?;
                self.log_session_end(session).await?;
                Ok(IdentityOutcome::SessionLogged)
            }
            other => {
                info!(event_type = other, "Ignoring unhandled webhook event");
                Ok(IdentityOutcome::Ignored)
            }
        }
    }

    pub async fn find_profile(
        &self,
        clerk_user_id: &str,
    ) -> Result<Option<user_profile::Model>, ServiceError> {
        user_profile::Entity::find()
            .filter(user_profile::Column::ClerkUserId.eq(clerk_user_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn upsert_profile(&self, user: UserData) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let email = user.email_addresses.into_iter().next().map(|e| e.email_address);

        match self.find_profile(&user.id).await? {
            Some(existing) => {
                let mut profile = existing.into_active_model();
                profile.email = Set(email);
                profile.first_name = Set(user.first_name);
                profile.last_name = Set(user.last_name);
                profile.update(db).await?;
                info!(clerk_user_id = %user.id, "User profile updated");
            }
            None => {
                user_profile::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    clerk_user_id: Set(user.id.clone()),
                    email: Set(email),
                    first_name: Set(user.first_name),
                    last_name: Set(user.last_name),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                info!(clerk_user_id = %user.id, "User profile created");
            }
        }
        Ok(())
    }

    async fn delete_profile(&self, clerk_user_id: &str) -> Result<u64, ServiceError> {
        let result = user_profile::Entity::delete_many()
            .filter(user_profile::Column::ClerkUserId.eq(clerk_user_id))
            .exec(self.db_pool.as_ref())
            .await?;
        info!(clerk_user_id, removed = result.rows_affected, "User profile deleted");
        Ok(result.rows_affected)
    }

    async fn log_session_end(&self, session: SessionData) -> Result<(), ServiceError> {
        session_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(session.user_id),
            session_id: Set(session.id),
            event: Set(session_log::SESSION_ENDED.to_string()),
            timestamp: Set(Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await?;
        Ok(())
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ServiceError> {
    serde_json::from_value(data)
        .map_err(|e| ServiceError::WebhookError(format!("Malformed event payload: {}", e)))
}

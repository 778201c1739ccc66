// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (identity fields plus embedded reward state)
//! - Todo items (per-user list, filtered by `owner_id`)

use crate::db::{collections, ClaimWrite, ProfileStore};
use crate::error::AppError;
use crate::models::{Identity, ProfilePatch, RewardState, TodoItem, UserProfile};
use async_trait::async_trait;

/// Profile fields written by a daily claim.
const CLAIM_FIELDS: [&str; 3] = ["coins", "engagement_score", "last_claim_at"];

/// Profile id read by `health_check`; never written.
const HEALTH_PROBE_ID: &str = "health-check";

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a client with no connection.
    ///
    /// Every operation fails with [`AppError::StoreUnavailable`]; this is the
    /// "feature disabled" state used when the real client cannot be built.
    pub fn new_offline() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or(AppError::StoreUnavailable)
    }

    /// Read one item and check that it belongs to `owner_id`.
    async fn get_owned_item(&self, owner_id: &str, item_id: &str) -> Result<TodoItem, AppError> {
        let item: Option<TodoItem> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TODO_ITEMS)
            .obj()
            .one(item_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        item.filter(|i| i.owner_id == owner_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))
    }
}

#[async_trait]
impl ProfileStore for FirestoreDb {
    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        if let Some(existing) = self.get_profile(&profile.id).await? {
            return Ok(existing);
        }

        // Insert fails if another session created the profile in the meantime;
        // in that case the stored profile wins.
        let inserted: Result<UserProfile, _> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await;

        match inserted {
            Ok(created) => {
                tracing::info!(uid = %profile.id, "Profile created");
                Ok(created)
            }
            Err(e) => {
                tracing::debug!(uid = %profile.id, error = %e, "Profile insert raced, re-reading");
                self.get_profile(&profile.id)
                    .await?
                    .ok_or_else(|| AppError::Database(e.to_string()))
            }
        }
    }

    async fn update_profile(&self, uid: &str, patch: &ProfilePatch) -> Result<(), AppError> {
        let mut profile = self
            .get_profile(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", uid)))?;
        patch.apply_to(&mut profile);

        let mut fields = Vec::new();
        if patch.email.is_some() {
            fields.push("email");
        }
        if patch.display_name.is_some() {
            fields.push("display_name");
        }
        if patch.photo_url.is_some() {
            fields.push("photo_url");
        }
        if patch.is_privileged.is_some() {
            fields.push("is_privileged");
        }
        if fields.is_empty() {
            return Ok(());
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::PROFILES)
            .document_id(uid)
            .object(&profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Apply a daily claim inside a Firestore transaction.
    ///
    /// The profile read is bound to the transaction, so a concurrent claim from
    /// another session makes the commit fail instead of double-crediting.
    async fn apply_claim(&self, uid: &str, claim: &ClaimWrite) -> Result<RewardState, AppError> {
        let client = self.get_client()?;
        let now = chrono::Utc::now();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<UserProfile> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(uid)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read profile in transaction: {}", e))
            })?;

        let is_new = current.is_none();
        let mut profile = current.unwrap_or_else(|| UserProfile::new(&Identity::from_uid(uid), now));

        if !claim.permits(profile.last_claim_at) {
            tracing::debug!(uid, "Daily reward already claimed (conditional write skipped)");
            let _ = transaction.rollback().await;
            return Err(AppError::NotEligible);
        }

        profile.coins = profile.coins.saturating_add(claim.coins);
        profile.engagement_score = profile.engagement_score.saturating_add(claim.engagement_score);
        profile.last_claim_at = Some(now);

        if is_new {
            client
                .fluent()
                .update()
                .in_col(collections::PROFILES)
                .document_id(uid)
                .object(&profile)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add profile to transaction: {}", e))
                })?;
        } else {
            client
                .fluent()
                .update()
                .fields(CLAIM_FIELDS)
                .in_col(collections::PROFILES)
                .document_id(uid)
                .object(&profile)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add claim to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            uid,
            coins = profile.coins,
            engagement_score = profile.engagement_score,
            "Daily claim committed"
        );

        Ok(profile.reward_state())
    }

    // ─── List Operations ─────────────────────────────────────────

    async fn list_items(&self, owner_id: &str) -> Result<Vec<TodoItem>, AppError> {
        let owner = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TODO_ITEMS)
            .filter(move |q| q.for_all([q.field("owner_id").eq(owner.clone())]))
            .order_by([
                ("created_at", firestore::FirestoreQueryDirection::Descending),
                ("id", firestore::FirestoreQueryDirection::Ascending),
            ])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn add_list_item(&self, owner_id: &str, text: &str) -> Result<TodoItem, AppError> {
        let item = TodoItem {
            id: uuid::Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.to_string(),
            text: text.to_string(),
            completed: false,
            created_at: chrono::Utc::now(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TODO_ITEMS)
            .document_id(&item.id)
            .object(&item)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(item)
    }

    async fn update_list_item(
        &self,
        owner_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<(), AppError> {
        let mut item = self.get_owned_item(owner_id, item_id).await?;
        item.completed = completed;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["completed"])
            .in_col(collections::TODO_ITEMS)
            .document_id(item_id)
            .object(&item)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_list_item(&self, owner_id: &str, item_id: &str) -> Result<(), AppError> {
        self.get_owned_item(owner_id, item_id).await?;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TODO_ITEMS)
            .document_id(item_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        // Point read of a document that never exists; succeeds iff the store answers.
        let _: Option<UserProfile> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(HEALTH_PROBE_ID)
            .await
            .map_err(|e| AppError::Database(format!("Health check read failed: {}", e)))?;
        Ok(())
    }
}

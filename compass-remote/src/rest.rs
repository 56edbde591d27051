//! REST remote store speaking the PostgREST dialect.

use crate::config::RemoteConfig;
use crate::error::RestClientError;
use crate::rows::{
    group_responses, AchievementInsert, DbAchievement, DbProfile, DbReflection, DbResponse,
    ProfileUpdate, ReflectionInsert, ReflectionUpdate, ResponseUpsert,
};
use async_trait::async_trait;
use compass_core::{
    Achievement, AchievementType, ProfilePatch, Reflection, ReflectionId, RemoteError, Response,
    ResponseMap, UserId, UserProfile,
};
use compass_storage::{NewReflection, ReflectionPatch, RemoteStore};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

const REST_PREFIX: &str = "/rest/v1";

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";
const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=minimal";

type Query<'a> = [(&'a str, String)];

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Remote store backed by the hosted REST endpoint.
///
/// Holds no entity state. The bearer token starts as the anonymous key and is
/// replaced by the user's access token once a session exists.
#[derive(Debug)]
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, RestClientError> {
        config.validate()?;
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Use the signed-in user's access token for subsequent calls, or fall
    /// back to the anonymous key with `None`.
    pub fn set_access_token(&self, token: Option<String>) -> Result<(), RestClientError> {
        let mut guard = self
            .access_token
            .write()
            .map_err(|_| RestClientError::LockPoisoned)?;
        *guard = token;
        Ok(())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PREFIX, table)
    }

    fn headers(&self, prefer: Option<&str>) -> Result<HeaderMap, RestClientError> {
        let token = self
            .access_token
            .read()
            .map_err(|_| RestClientError::LockPoisoned)?
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        build_headers(&self.anon_key, &token, prefer)
    }

    async fn get_rows<T>(&self, table: &str, query: &Query<'_>) -> Result<Vec<T>, RestClientError>
    where
        T: DeserializeOwned,
    {
        tracing::debug!(table, "GET rows");
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers(None)?)
            .query(query)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn post_rows<B>(
        &self,
        table: &str,
        query: &Query<'_>,
        body: &B,
        prefer: &str,
    ) -> Result<reqwest::Response, RestClientError>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!(table, prefer, "POST rows");
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers(Some(prefer))?)
            .query(query)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn patch_rows<B>(
        &self,
        table: &str,
        query: &Query<'_>,
        body: &B,
        prefer: &str,
    ) -> Result<reqwest::Response, RestClientError>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!(table, prefer, "PATCH rows");
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.headers(Some(prefer))?)
            .query(query)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn responses_for(
        &self,
        ids: &[String],
    ) -> Result<std::collections::HashMap<String, ResponseMap>, RestClientError> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        let filter = if ids.len() == 1 {
            ("reflection_id", format!("eq.{}", ids[0]))
        } else {
            ("reflection_id", format!("in.({})", ids.join(",")))
        };
        let rows: Vec<DbResponse> = self
            .get_rows("responses", &[("select", "*".to_string()), filter])
            .await?;
        Ok(group_responses(rows))
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn create_reflection(&self, new: &NewReflection) -> Result<Reflection, RemoteError> {
        let insert = ReflectionInsert::from(new);
        let response = self
            .post_rows("reflections", &[], &insert, RETURN_REPRESENTATION)
            .await?;
        let mut rows = response
            .json::<Vec<DbReflection>>()
            .await
            .map_err(RestClientError::from)?;
        if rows.is_empty() {
            return Err(RestClientError::InvalidResponse(
                "insert returned no reflection row".to_string(),
            )
            .into());
        }
        let created = rows.swap_remove(0);
        tracing::debug!(requested = %new.id, assigned = %created.id, "Reflection created");
        Ok(created
            .into_reflection(ResponseMap::new())
            .map_err(RestClientError::from)?)
    }

    async fn get_reflection(&self, id: &ReflectionId) -> Result<Option<Reflection>, RemoteError> {
        let mut rows: Vec<DbReflection> = self
            .get_rows(
                "reflections",
                &[("select", "*".to_string()), ("id", format!("eq.{id}"))],
            )
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let row = rows.swap_remove(0);
        let mut grouped = self.responses_for(&[row.id.clone()]).await?;
        let responses = grouped.remove(&row.id).unwrap_or_default();
        Ok(Some(
            row.into_reflection(responses)
                .map_err(RestClientError::from)?,
        ))
    }

    async fn update_reflection(
        &self,
        id: &ReflectionId,
        patch: &ReflectionPatch,
    ) -> Result<(), RemoteError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.patch_rows(
            "reflections",
            &[("id", format!("eq.{id}"))],
            &ReflectionUpdate::from(patch),
            RETURN_MINIMAL,
        )
        .await?;
        Ok(())
    }

    async fn upsert_responses(
        &self,
        reflection_id: &ReflectionId,
        responses: &[Response],
    ) -> Result<(), RemoteError> {
        if responses.is_empty() {
            return Ok(());
        }
        let rows: Vec<ResponseUpsert> = responses
            .iter()
            .map(|r| ResponseUpsert::new(reflection_id, r))
            .collect();
        self.post_rows(
            "responses",
            &[("on_conflict", "reflection_id,question_id".to_string())],
            &rows,
            MERGE_DUPLICATES,
        )
        .await?;
        Ok(())
    }

    async fn unlock_achievement(
        &self,
        user_id: &UserId,
        achievement_type: AchievementType,
    ) -> Result<(), RemoteError> {
        let row = AchievementInsert {
            user_id: user_id.to_string(),
            achievement_type: achievement_type.as_db_str(),
        };
        match self
            .post_rows(
                "achievements",
                &[("on_conflict", "user_id,type".to_string())],
                &row,
                IGNORE_DUPLICATES,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(%user_id, %achievement_type, "Achievement already unlocked");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_reflections(&self, user_id: &UserId) -> Result<Vec<Reflection>, RemoteError> {
        let rows: Vec<DbReflection> = self
            .get_rows(
                "reflections",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("order", "year.desc,created_at.desc".to_string()),
                ],
            )
            .await?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut grouped = self.responses_for(&ids).await?;

        let reflections = rows
            .into_iter()
            .map(|row| {
                let responses = grouped.remove(&row.id).unwrap_or_default();
                row.into_reflection(responses)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(RestClientError::from)?;
        Ok(reflections)
    }

    async fn list_achievements(&self, user_id: &UserId) -> Result<Vec<Achievement>, RemoteError> {
        let rows: Vec<DbAchievement> = self
            .get_rows(
                "achievements",
                &[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                ],
            )
            .await?;
        let achievements = rows
            .into_iter()
            .map(DbAchievement::into_achievement)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RestClientError::from)?;
        Ok(achievements)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        let rows: Vec<DbProfile> = self
            .get_rows(
                "profiles",
                &[("select", "*".to_string()), ("id", format!("eq.{user_id}"))],
            )
            .await?;
        Ok(rows.into_iter().next().map(DbProfile::into_profile))
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Option<UserProfile>, RemoteError> {
        let response = self
            .patch_rows(
                "profiles",
                &[("id", format!("eq.{user_id}"))],
                &ProfileUpdate::from(patch),
                RETURN_REPRESENTATION,
            )
            .await?;
        let rows = response
            .json::<Vec<DbProfile>>()
            .await
            .map_err(RestClientError::from)?;
        Ok(rows.into_iter().next().map(DbProfile::into_profile))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RestClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await?;
    let message = match serde_json::from_str::<PostgrestError>(&text) {
        Ok(PostgrestError {
            code: Some(code),
            message,
        }) => format!("{}: {}", code, message.unwrap_or_default()),
        Ok(PostgrestError {
            code: None,
            message: Some(message),
        }) => message,
        _ => text,
    };
    Err(RestClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn build_headers(
    anon_key: &str,
    token: &str,
    prefer: Option<&str>,
) -> Result<HeaderMap, RestClientError> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| RestClientError::InvalidConfig {
        field: "remote.anon_key",
        reason: e.to_string(),
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("apikey"),
        HeaderValue::from_str(anon_key).map_err(invalid)?,
    );
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(invalid)?,
    );
    if let Some(prefer) = prefer {
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_str(prefer).map_err(invalid)?,
        );
    }
    Ok(headers)
}

//! GraphMediaProvider - IMediaProvider implementation for the Instagram Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the auth, publish, insights and
//! paging modules to fulfil the [`IMediaProvider`] port contract.
//!
//! ## Design Notes
//!
//! - Every operation returns an [`Outcome`]; [`GraphError`]s are converted at
//!   one place, [`respond`], so error mapping cannot drift between actions.
//! - The credential is read from the context's store on every call and never
//!   cached.
//! - A dry-run context short-circuits before any store read or remote call.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use instagraph_core::config::Config;
use instagraph_core::domain::{
    ContainerStatus, Credential, CredentialSummary, MetricSet, Period, PublishedMedia,
    TopPostItem, ACCOUNT_METRICS, MEDIA_METRICS,
};
use instagraph_core::ports::{
    AuthStart, ContainerStatusReport, IMediaProvider, MediaPage, ProviderContext,
    PublishCarouselRequest, PublishPhotoRequest, PublishVideoRequest, SetTokenRequest,
};
use instagraph_core::{ApiError, Outcome};

use crate::auth::OAuthFlow;
use crate::client::GraphClient;
use crate::insights::InsightsCascade;
use crate::paging;
use crate::publish::{PollPolicy, PublishEngine, RetryPolicy, Sleeper, TokioSleeper};
use crate::GraphError;

/// Action names reported in every `Outcome`
pub mod actions {
    pub const AUTH_START: &str = "auth.start";
    pub const AUTH_FINISH: &str = "auth.finish";
    pub const AUTH_SET_TOKEN: &str = "auth.set_token";
    pub const AUTH_STATUS: &str = "auth.status";
    pub const ACCOUNT_PROFILE: &str = "account.profile";
    pub const MEDIA_LIST: &str = "media.list";
    pub const PUBLISH_PHOTO: &str = "publish.photo";
    pub const PUBLISH_VIDEO: &str = "publish.video";
    pub const PUBLISH_CAROUSEL: &str = "publish.carousel";
    pub const PUBLISH_STATUS: &str = "publish.status";
    pub const INSIGHTS_MEDIA: &str = "insights.media";
    pub const INSIGHTS_ACCOUNT: &str = "insights.account";
    pub const INSIGHTS_TOP_POSTS: &str = "insights.top_posts";
}

const DRY_RUN_ID: &str = "dry-run";
const DRY_RUN_MEDIA_ID: &str = "dry-run-media";
const DRY_RUN_STATE: &str = "dry-run-state";

/// Converts an internal result into the outbound envelope
fn respond<T>(action: &str, result: Result<T, GraphError>) -> Outcome<T> {
    match result {
        Ok(data) => Outcome::success(action, data),
        Err(err) => {
            let error = ApiError::from(err);
            warn!(action, code = %error.code, message = %error.message, "Operation failed");
            Outcome::failure(error)
        }
    }
}

// ============================================================================
// GraphMediaProvider
// ============================================================================

/// Media provider backed by the Instagram Graph API
pub struct GraphMediaProvider {
    client: GraphClient,
    config: Config,
    sleeper: Arc<dyn Sleeper>,
}

impl GraphMediaProvider {
    /// Creates a provider whose transport follows the `graph` config section
    pub fn new(config: Config) -> Self {
        Self {
            client: GraphClient::from_config(&config.graph),
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the sleeper used for poll intervals and publish backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn oauth(&self) -> OAuthFlow<'_> {
        OAuthFlow::new(&self.client, &self.config.oauth)
    }

    fn publish_engine<'a>(&'a self, credential: &'a Credential) -> PublishEngine<'a> {
        PublishEngine::new(
            &self.client,
            &credential.access_token,
            &credential.ig_user_id,
            self.sleeper.as_ref(),
        )
        .with_poll_policy(PollPolicy::from(&self.config.publish))
        .with_retry_policy(RetryPolicy::from(&self.config.publish))
    }

    /// Loads a usable credential for the context's account
    async fn credential(&self, ctx: &ProviderContext) -> Result<Credential, GraphError> {
        let credential = ctx
            .credential()
            .await
            .map_err(GraphError::Storage)?
            .ok_or_else(|| {
                GraphError::AuthRequired(format!(
                    "No credential stored for account '{}'",
                    ctx.account
                ))
            })?;

        if credential.is_expired() {
            return Err(GraphError::AuthRequired(format!(
                "Access token for account '{}' has expired",
                ctx.account
            )));
        }
        Ok(credential)
    }

    fn dry_run_summary(&self) -> CredentialSummary {
        CredentialSummary {
            authenticated: true,
            ig_user_id: Some(DRY_RUN_ID.to_string()),
            scope: self.config.oauth.scopes.clone(),
            expires_at: None,
            expired: false,
        }
    }

    // ------------------------------------------------------------------------
    // Operation bodies
    // ------------------------------------------------------------------------

    async fn run_auth_finish(
        &self,
        ctx: &ProviderContext,
        code: &str,
        state: &str,
    ) -> Result<CredentialSummary, GraphError> {
        let credential = self
            .oauth()
            .finish(ctx.store.as_ref(), &ctx.account, code, state)
            .await?;
        Ok(credential.summary())
    }

    async fn run_set_token(
        &self,
        ctx: &ProviderContext,
        request: SetTokenRequest,
    ) -> Result<CredentialSummary, GraphError> {
        if request.access_token.trim().is_empty() {
            return Err(GraphError::validation("access_token must not be empty"));
        }
        if request.ig_user_id.trim().is_empty() {
            return Err(GraphError::validation("ig_user_id must not be empty"));
        }

        let credential = Credential::new(request.access_token, request.ig_user_id)
            .with_scope(request.scope);
        ctx.set_credential(&credential)
            .await
            .map_err(GraphError::Storage)?;

        debug!(account = %ctx.account, "Stored provided access token");
        Ok(credential.summary())
    }

    async fn run_auth_status(&self, ctx: &ProviderContext) -> Result<CredentialSummary, GraphError> {
        let credential = ctx.credential().await.map_err(GraphError::Storage)?;
        Ok(credential
            .map(|c| c.summary())
            .unwrap_or_else(CredentialSummary::unauthenticated))
    }

    async fn run_profile(&self, ctx: &ProviderContext) -> Result<Value, GraphError> {
        let credential = self.credential(ctx).await?;
        let profile = self
            .client
            .get_profile(&credential.access_token, &credential.ig_user_id)
            .await?;
        Ok(Value::Object(profile))
    }

    async fn run_list_media(
        &self,
        ctx: &ProviderContext,
        limit: u32,
        after: Option<&str>,
    ) -> Result<MediaPage, GraphError> {
        let credential = self.credential(ctx).await?;
        paging::list_media(
            &self.client,
            &credential.access_token,
            &credential.ig_user_id,
            limit,
            after,
        )
        .await
    }

    async fn run_publish_photo(
        &self,
        ctx: &ProviderContext,
        request: PublishPhotoRequest,
    ) -> Result<PublishedMedia, GraphError> {
        let credential = self.credential(ctx).await?;
        self.publish_engine(&credential)
            .publish_photo(&request.image_url, request.caption.as_deref())
            .await
    }

    async fn run_publish_video(
        &self,
        ctx: &ProviderContext,
        request: PublishVideoRequest,
    ) -> Result<PublishedMedia, GraphError> {
        let credential = self.credential(ctx).await?;
        self.publish_engine(&credential)
            .publish_video(
                &request.video_url,
                request.caption.as_deref(),
                request.cover_url.as_deref(),
                request.share_to_feed,
            )
            .await
    }

    async fn run_publish_carousel(
        &self,
        ctx: &ProviderContext,
        request: PublishCarouselRequest,
    ) -> Result<PublishedMedia, GraphError> {
        let credential = self.credential(ctx).await?;
        self.publish_engine(&credential)
            .publish_carousel(&request.items, request.caption.as_deref())
            .await
    }

    async fn run_container_status(
        &self,
        ctx: &ProviderContext,
        creation_id: &str,
    ) -> Result<ContainerStatusReport, GraphError> {
        if creation_id.trim().is_empty() {
            return Err(GraphError::validation("creation_id must not be empty"));
        }
        let credential = self.credential(ctx).await?;
        self.publish_engine(&credential).fetch_status(creation_id).await
    }

    async fn run_media_insights(
        &self,
        ctx: &ProviderContext,
        media_id: &str,
    ) -> Result<MetricSet, GraphError> {
        if media_id.trim().is_empty() {
            return Err(GraphError::validation("media_id must not be empty"));
        }
        let credential = self.credential(ctx).await?;
        InsightsCascade::new(&self.client, &credential.access_token)
            .media_insights(media_id)
            .await
    }

    async fn run_account_insights(
        &self,
        ctx: &ProviderContext,
        period: Period,
    ) -> Result<MetricSet, GraphError> {
        let credential = self.credential(ctx).await?;
        InsightsCascade::new(&self.client, &credential.access_token)
            .account_insights(&credential.ig_user_id, period)
            .await
    }

    async fn run_top_posts(
        &self,
        ctx: &ProviderContext,
        days: u32,
        limit: usize,
    ) -> Result<Vec<TopPostItem>, GraphError> {
        let credential = self.credential(ctx).await?;
        InsightsCascade::new(&self.client, &credential.access_token)
            .top_posts(
                &credential.ig_user_id,
                days,
                limit,
                self.config.insights.top_posts_fetch_limit,
                Utc::now(),
            )
            .await
    }
}

#[async_trait::async_trait]
impl IMediaProvider for GraphMediaProvider {
    async fn auth_start(
        &self,
        ctx: &ProviderContext,
        redirect_uri: Option<&str>,
    ) -> Outcome<AuthStart> {
        if ctx.dry_run {
            let redirect_uri = redirect_uri.unwrap_or(&self.config.oauth.redirect_uri);
            return Outcome::success(
                actions::AUTH_START,
                AuthStart {
                    login_url: format!("{}?dry_run=true", self.config.oauth.authorize_url),
                    state: DRY_RUN_STATE.to_string(),
                    redirect_uri: redirect_uri.to_string(),
                },
            );
        }
        let result = self
            .oauth()
            .start(ctx.store.as_ref(), &ctx.account, redirect_uri)
            .await;
        respond(actions::AUTH_START, result)
    }

    async fn auth_finish(
        &self,
        ctx: &ProviderContext,
        code: &str,
        state: &str,
    ) -> Outcome<CredentialSummary> {
        if ctx.dry_run {
            return Outcome::success(actions::AUTH_FINISH, self.dry_run_summary());
        }
        respond(
            actions::AUTH_FINISH,
            self.run_auth_finish(ctx, code, state).await,
        )
    }

    async fn auth_set_token(
        &self,
        ctx: &ProviderContext,
        request: SetTokenRequest,
    ) -> Outcome<CredentialSummary> {
        if ctx.dry_run {
            return Outcome::success(actions::AUTH_SET_TOKEN, self.dry_run_summary());
        }
        respond(
            actions::AUTH_SET_TOKEN,
            self.run_set_token(ctx, request).await,
        )
    }

    async fn auth_status(&self, ctx: &ProviderContext) -> Outcome<CredentialSummary> {
        if ctx.dry_run {
            return Outcome::success(actions::AUTH_STATUS, self.dry_run_summary());
        }
        respond(actions::AUTH_STATUS, self.run_auth_status(ctx).await)
    }

    async fn account_profile(&self, ctx: &ProviderContext) -> Outcome<Value> {
        if ctx.dry_run {
            return Outcome::success(
                actions::ACCOUNT_PROFILE,
                json!({
                    "id": DRY_RUN_ID,
                    "username": DRY_RUN_ID,
                    "followers_count": 0,
                    "follows_count": 0,
                    "media_count": 0
                }),
            );
        }
        respond(actions::ACCOUNT_PROFILE, self.run_profile(ctx).await)
    }

    async fn list_media(
        &self,
        ctx: &ProviderContext,
        limit: u32,
        after: Option<&str>,
    ) -> Outcome<MediaPage> {
        if ctx.dry_run {
            return Outcome::success(actions::MEDIA_LIST, MediaPage::empty());
        }
        respond(
            actions::MEDIA_LIST,
            self.run_list_media(ctx, limit, after).await,
        )
    }

    async fn publish_photo(
        &self,
        ctx: &ProviderContext,
        request: PublishPhotoRequest,
    ) -> Outcome<PublishedMedia> {
        if ctx.dry_run {
            return Outcome::success(
                actions::PUBLISH_PHOTO,
                PublishedMedia::new(DRY_RUN_MEDIA_ID),
            );
        }
        respond(
            actions::PUBLISH_PHOTO,
            self.run_publish_photo(ctx, request).await,
        )
    }

    async fn publish_video(
        &self,
        ctx: &ProviderContext,
        request: PublishVideoRequest,
    ) -> Outcome<PublishedMedia> {
        if ctx.dry_run {
            return Outcome::success(
                actions::PUBLISH_VIDEO,
                PublishedMedia::new(DRY_RUN_MEDIA_ID),
            );
        }
        respond(
            actions::PUBLISH_VIDEO,
            self.run_publish_video(ctx, request).await,
        )
    }

    async fn publish_carousel(
        &self,
        ctx: &ProviderContext,
        request: PublishCarouselRequest,
    ) -> Outcome<PublishedMedia> {
        if ctx.dry_run {
            return Outcome::success(
                actions::PUBLISH_CAROUSEL,
                PublishedMedia::new(DRY_RUN_MEDIA_ID),
            );
        }
        respond(
            actions::PUBLISH_CAROUSEL,
            self.run_publish_carousel(ctx, request).await,
        )
    }

    async fn container_status(
        &self,
        ctx: &ProviderContext,
        creation_id: &str,
    ) -> Outcome<ContainerStatusReport> {
        if ctx.dry_run {
            return Outcome::success(
                actions::PUBLISH_STATUS,
                ContainerStatusReport {
                    creation_id: creation_id.to_string(),
                    status: ContainerStatus::Finished,
                    status_code: Some("FINISHED".to_string()),
                },
            );
        }
        respond(
            actions::PUBLISH_STATUS,
            self.run_container_status(ctx, creation_id).await,
        )
    }

    async fn media_insights(&self, ctx: &ProviderContext, media_id: &str) -> Outcome<MetricSet> {
        if ctx.dry_run {
            return Outcome::success(
                actions::INSIGHTS_MEDIA,
                MetricSet::zeroed(MEDIA_METRICS),
            );
        }
        respond(
            actions::INSIGHTS_MEDIA,
            self.run_media_insights(ctx, media_id).await,
        )
    }

    async fn account_insights(&self, ctx: &ProviderContext, period: Period) -> Outcome<MetricSet> {
        if ctx.dry_run {
            return Outcome::success(
                actions::INSIGHTS_ACCOUNT,
                MetricSet::zeroed(ACCOUNT_METRICS),
            );
        }
        respond(
            actions::INSIGHTS_ACCOUNT,
            self.run_account_insights(ctx, period).await,
        )
    }

    async fn top_posts(
        &self,
        ctx: &ProviderContext,
        days: u32,
        limit: usize,
    ) -> Outcome<Vec<TopPostItem>> {
        if ctx.dry_run {
            return Outcome::success(actions::INSIGHTS_TOP_POSTS, Vec::new());
        }
        respond(
            actions::INSIGHTS_TOP_POSTS,
            self.run_top_posts(ctx, days, limit).await,
        )
    }
}

//! Stats report pipeline: secret → list counts → summary → chat.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::chat::{ChatError, ChatNotifier};
use crate::config::{RelayConfig, SegmentConfig};
use crate::mailchimp::{ListStatsReader, MailchimpError};
use crate::observability::TraceContext;
use crate::report::format::{render_summary, SegmentCount};
use crate::secrets::{SecretError, SecretRef, SecretStore};

/// Any failure of the pipeline, by collaborator.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Mailchimp(#[from] MailchimpError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    /// The run did not finish within the handler deadline.
    #[error("stats report did not finish within {0:?}")]
    Timeout(Duration),
}

impl ReportError {
    /// HTTP status surfaced to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReportError::Secret(_) => StatusCode::SERVICE_UNAVAILABLE,
            ReportError::Mailchimp(MailchimpError::InvalidApiKey) => StatusCode::INTERNAL_SERVER_ERROR,
            ReportError::Mailchimp(_) | ReportError::Chat(_) => StatusCode::BAD_GATEWAY,
            ReportError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Everything the pipeline needs to know besides its collaborators.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub list_id: String,
    pub segments: Vec<SegmentConfig>,
    pub title: String,
    pub api_key_secret: SecretRef,
    pub webhook_secret: SecretRef,
    pub require_chat_success: bool,
}

impl ReportSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        let version = &config.secrets.version;
        Self {
            list_id: config.mailchimp.list_id.clone(),
            segments: config.report.segments.clone(),
            title: config.report.title.clone(),
            api_key_secret: SecretRef::new(&config.secrets.mailchimp_api_key, version),
            webhook_secret: SecretRef::new(&config.secrets.chat_webhook_url, version),
            require_chat_success: config.chat.require_success,
        }
    }
}

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub total: u64,
    pub segments: Vec<SegmentCount>,
    pub content: String,
    pub chat_status: StatusCode,
}

/// Composes the three collaborators into one report run.
pub struct StatsReporter {
    secrets: Arc<dyn SecretStore>,
    lists: Arc<dyn ListStatsReader>,
    chat: Arc<dyn ChatNotifier>,
    settings: ReportSettings,
}

impl StatsReporter {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        lists: Arc<dyn ListStatsReader>,
        chat: Arc<dyn ChatNotifier>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            secrets,
            lists,
            chat,
            settings,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// [`run`](Self::run) bounded by `deadline`; the unfinished run is dropped.
    pub async fn run_within(
        &self,
        ctx: &TraceContext,
        deadline: Duration,
    ) -> Result<StatsReport, ReportError> {
        tokio::time::timeout(deadline, self.run(ctx))
            .await
            .map_err(|_| ReportError::Timeout(deadline))?
    }

    /// Collect the counts and post the summary.
    pub async fn run(&self, ctx: &TraceContext) -> Result<StatsReport, ReportError> {
        let settings = &self.settings;

        let api_key = self.secrets.get_secret(ctx, &settings.api_key_secret).await?;

        let total = self
            .lists
            .list_member_count(ctx, &api_key, &settings.list_id)
            .await?;

        let mut segments = Vec::with_capacity(settings.segments.len());
        for segment in &settings.segments {
            let member_count = self
                .lists
                .segment_member_count(ctx, &api_key, &settings.list_id, &segment.id)
                .await?;
            segments.push(SegmentCount {
                id: segment.id.clone(),
                label: segment.label.clone(),
                member_count,
            });
        }

        let content = render_summary(&settings.title, &segments, total);
        tracing::debug!(trace = %ctx, content = %content, "Constructed chat message");

        let webhook_url = self.secrets.get_secret(ctx, &settings.webhook_secret).await?;
        let chat_status = self.chat.post_message(ctx, &webhook_url, &content).await?;

        if !chat_status.is_success() {
            if settings.require_chat_success {
                return Err(ChatError::Rejected { status: chat_status }.into());
            }
            tracing::warn!(trace = %ctx, status = %chat_status, "Chat webhook rejected the summary");
        }

        Ok(StatsReport {
            total,
            segments,
            content,
            chat_status,
        })
    }
}

//! Page assembler: bounded-wait orchestration of entity, style and proof
//! tasks into a single view model.
//!
//! The entity task is scheduled first; two continuations follow a
//! successful resolve, one for the style and one fanning out a task per
//! proof URI. The request waits a short bounded time on the entity, then
//! serves whatever the cache holds. An incomplete view renders with an
//! auto-refresh directive, and the scheduled tasks keep warming the cache
//! for the next load; the request going away does not cancel them.

use crate::state::AppState;
use keyproofs_core::{Entity, Error, Proof, Style, TaskKey};
use keyproofs_resolver::{classify, style};
use keyproofs_runner::Task;
use std::sync::Arc;
use std::time::Duration;

/// How long a request waits on the entity task before serving a partial
/// page.
pub const PAGE_WAIT: Duration = Duration::from_secs(2);

/// Everything the page renderer needs.
pub struct PageView {
    pub entity: Option<Arc<Entity>>,
    pub style: Arc<Style>,
    pub proofs: Vec<Arc<Proof>>,
    pub has_proofs: bool,
    pub is_complete: bool,
    pub error: Option<String>,
}

impl PageView {
    fn empty() -> Self {
        Self {
            entity: None,
            style: Arc::new(Style::fallback()),
            proofs: Vec::new(),
            has_proofs: false,
            is_complete: false,
            error: None,
        }
    }
}

/// Schedule the entity task for `id` plus its style/proof continuations.
pub async fn schedule(state: &AppState, id: &str) -> Task {
    let keys = state.keys.clone();
    let lookup_id = id.to_string();
    let task = state
        .runner
        .run(TaskKey::Entity(id.to_string()), move |ctx| async move {
            match keys.fetch(&lookup_id).await {
                Ok(entity) => {
                    tracing::debug!(key = %ctx.key(), "resolving entity");
                    ctx.resolve(entity);
                }
                Err(err) => ctx.reject(err),
            }
        })
        .await;

    let dns = state.dns.clone();
    task.after(move |q| async move {
        let Some(entity) = q.result().entity() else { return };
        let email = entity.primary.address.clone();
        tracing::info!(email = %email, "scheduling style");

        let task_email = email.clone();
        q.run(TaskKey::Style(email), move |ctx| async move {
            let style = style::get_style(dns.as_ref(), &task_email).await;
            tracing::debug!(key = %ctx.key(), "resolving style");
            ctx.resolve(style);
        })
        .await;
    });

    let http = state.http.clone();
    let settings = state.proof_settings.clone();
    task.after(move |q| async move {
        let Some(entity) = q.result().entity() else { return };
        tracing::info!(num = entity.proofs.len(), "scheduling proofs");

        for uri in entity.proofs.iter().cloned() {
            let http = http.clone();
            let settings = settings.clone();
            let fingerprint = entity.fingerprint.clone();

            q.run(TaskKey::Proof(uri.clone()), move |ctx| async move {
                let mut check = classify(&uri, &fingerprint, &settings);
                if let Err(err) = check.resolve(&http).await {
                    if err != Error::NoFingerprint {
                        tracing::debug!(key = %ctx.key(), error = %err, "proof check failed");
                    }
                }
                tracing::debug!(key = %ctx.key(), status = %check.proof().status, "resolving proof");
                ctx.resolve(check.into_proof());
            })
            .await;
        }
    });

    task
}

/// Assemble the view for `id`, waiting at most [`PAGE_WAIT`] for the
/// entity.
pub async fn assemble(state: &AppState, id: &str) -> PageView {
    let task = schedule(state, id).await;
    let mut view = PageView::empty();

    match tokio::time::timeout(PAGE_WAIT, task.wait()).await {
        Ok(Ok(value)) => {
            view.entity = value.entity();
        }
        Ok(Err(err)) => {
            view.error = Some(err.to_string());
            view.is_complete = true;
        }
        Err(_) => {
            tracing::debug!(id, "deadline timeout, serving from cache");
            if let Some(value) = state.cache.get(&TaskKey::Entity(id.to_string())) {
                view.entity = value.entity();
            }
        }
    }

    if let Some(entity) = view.entity.clone() {
        let mut got_style = false;
        if let Some(style) = state
            .cache
            .get(&TaskKey::Style(entity.primary.address.clone()))
            .and_then(|v| v.style())
        {
            view.style = style;
            got_style = true;
        }

        let mut got_proofs = true;
        if !entity.proofs.is_empty() {
            view.has_proofs = true;
            for uri in &entity.proofs {
                match state
                    .cache
                    .get(&TaskKey::Proof(uri.clone()))
                    .and_then(|v| v.proof())
                {
                    Some(proof) => {
                        tracing::debug!(uri, "proof from cache");
                        view.proofs.push(proof);
                    }
                    None => {
                        tracing::debug!(uri, "missing proof");
                        view.proofs.push(Arc::new(
                            classify(uri, &entity.fingerprint, &state.proof_settings).into_proof(),
                        ));
                        got_proofs = false;
                    }
                }
            }
        }

        view.is_complete = got_style && got_proofs;
    }

    view
}

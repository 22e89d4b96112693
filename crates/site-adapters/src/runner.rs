use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cdp_adapter::{AdapterError, PageId};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::errors::DriverError;
use crate::model::{normalized_len, DeliveryReport, DeliveryRequest, InjectStrategy, SubmitPath};
use crate::ports::{DomPort, SubmitState};
use crate::sites::SiteProfile;
use crate::wait::poll_until;

/// A missing submit control is re-probed this many poll intervals before Enter is used instead.
const MISSING_SUBMIT_POLLS: u32 = 5;

pub(crate) struct RuntimeDeps<'a> {
    pub dom: &'a dyn DomPort,
    pub profile: &'a SiteProfile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Acquire,
    Inject,
    Enable,
    /// The submit action may have reached the page.
    Submit,
}

struct StepFailure {
    stage: Stage,
    error: DriverError,
}

impl StepFailure {
    fn at(stage: Stage) -> impl FnOnce(DriverError) -> StepFailure {
        move |error| StepFailure { stage, error }
    }

    fn port(stage: Stage) -> impl FnOnce(AdapterError) -> StepFailure {
        move |err| StepFailure {
            stage,
            error: DriverError::Port(err),
        }
    }
}

struct Submitted {
    strategy: InjectStrategy,
    path: SubmitPath,
    observed: usize,
}

enum SubmitTarget {
    Click(String),
    Enter,
}

/// Run acquire, inject, enablement and submit, then the single Enter fallback on failure.
///
/// The caller owns idempotency; this function submits at most once per fallback-free run.
#[instrument(skip_all, fields(site = %request.site, page = %page, id = %request.id))]
pub(crate) async fn execute(
    page: PageId,
    request: &DeliveryRequest,
    deps: RuntimeDeps<'_>,
) -> Result<DeliveryReport, DriverError> {
    let started = Instant::now();
    let expected = normalized_len(&request.prompt);

    let failure = match run_protocol(page, request, expected, &deps).await {
        Ok(done) => {
            info!(
                target: "site-adapters",
                strategy = done.strategy.as_str(),
                path = ?done.path,
                observed = done.observed,
                "prompt submitted"
            );
            return Ok(DeliveryReport::submitted(
                request,
                page,
                started,
                Some(done.strategy),
                done.path,
                Some(done.observed),
            ));
        }
        Err(failure) => failure,
    };

    if failure.stage == Stage::Submit {
        let error = uncertain(deps.profile, failure.error);
        warn!(target: "site-adapters", error = %error, "submit sent but not confirmed");
        return Err(error);
    }
    if !failure.error.allows_fallback() {
        warn!(target: "site-adapters", stage = ?failure.stage, error = %failure.error, "delivery failed");
        return Err(failure.error);
    }

    warn!(
        target: "site-adapters",
        stage = ?failure.stage,
        error = %failure.error,
        "protocol failed; trying focus + Enter"
    );
    match fallback(page, request, expected, &deps).await {
        Ok(observed) => {
            info!(target: "site-adapters", observed, "prompt submitted via fallback");
            Ok(DeliveryReport::submitted(
                request,
                page,
                started,
                None,
                SubmitPath::FallbackEnter,
                Some(observed),
            ))
        }
        Err(fallback_err) if fallback_err.may_have_submitted() => {
            warn!(target: "site-adapters", error = %fallback_err, "fallback Enter sent but not confirmed");
            Err(fallback_err)
        }
        Err(fallback_err) => {
            debug!(target: "site-adapters", error = %fallback_err, "fallback failed");
            Err(failure.error)
        }
    }
}

/// Port failures from the submit step leave the outcome unknown and must not be redelivered.
fn uncertain(profile: &SiteProfile, error: DriverError) -> DriverError {
    match error {
        DriverError::Port(source) => DriverError::SubmitUncertain {
            site: profile.id,
            source,
        },
        other => other,
    }
}

async fn run_protocol(
    page: PageId,
    request: &DeliveryRequest,
    expected: usize,
    deps: &RuntimeDeps<'_>,
) -> Result<Submitted, StepFailure> {
    let input = acquire(page, deps).await?;
    debug!(target: "site-adapters", selector = %input, "input acquired");

    let (strategy, observed) = inject(page, &input, request, expected, deps).await?;

    let target = await_enabled(page, deps).await?;

    let path = match target {
        SubmitTarget::Click(selector) => {
            let clicked = deps
                .dom
                .click(page, &selector)
                .await
                .map_err(StepFailure::port(Stage::Submit))?;
            if clicked {
                SubmitPath::Click
            } else {
                // Control vanished between the probe and the click.
                press_enter(page, &input, deps).await?;
                SubmitPath::Enter
            }
        }
        SubmitTarget::Enter => {
            press_enter(page, &input, deps).await?;
            SubmitPath::Enter
        }
    };

    Ok(Submitted {
        strategy,
        path,
        observed,
    })
}

async fn acquire(page: PageId, deps: &RuntimeDeps<'_>) -> Result<String, StepFailure> {
    let timeouts = &deps.profile.timeouts;
    let dom = deps.dom;
    let selectors = &deps.profile.input_selectors;
    let found = poll_until(timeouts.acquire(), timeouts.poll(), || dom.probe(page, selectors))
    .await
    .map_err(StepFailure::port(Stage::Acquire))?;

    found.ok_or_else(|| {
        StepFailure::at(Stage::Acquire)(DriverError::TargetTimeout {
            site: deps.profile.id,
            waited: timeouts.acquire(),
        })
    })
}

async fn inject(
    page: PageId,
    input: &str,
    request: &DeliveryRequest,
    expected: usize,
    deps: &RuntimeDeps<'_>,
) -> Result<(InjectStrategy, usize), StepFailure> {
    let mut last_observed = 0usize;
    for strategy in &deps.profile.strategies {
        match apply_strategy(page, input, &request.prompt, *strategy, deps.dom).await {
            Ok(()) => {}
            Err(err) if err.retriable => {
                return Err(StepFailure::port(Stage::Inject)(err));
            }
            Err(err) => {
                debug!(
                    target: "site-adapters",
                    strategy = strategy.as_str(),
                    error = %err,
                    "injection strategy raised"
                );
                continue;
            }
        }

        sleep(deps.profile.timeouts.settle()).await;
        let text = deps
            .dom
            .read_text(page, input)
            .await
            .map_err(StepFailure::port(Stage::Inject))?;
        let observed = normalized_len(&text);
        if observed == expected {
            return Ok((*strategy, observed));
        }
        debug!(
            target: "site-adapters",
            strategy = strategy.as_str(),
            expected,
            observed,
            "read-back length mismatch"
        );
        last_observed = observed;
    }

    Err(StepFailure::at(Stage::Inject)(DriverError::InjectionMismatch {
        site: deps.profile.id,
        expected,
        observed: last_observed,
    }))
}

async fn apply_strategy(
    page: PageId,
    input: &str,
    text: &str,
    strategy: InjectStrategy,
    dom: &dyn DomPort,
) -> Result<(), AdapterError> {
    match strategy {
        InjectStrategy::NativeSetter => dom.set_value(page, input, text).await,
        InjectStrategy::ExecCommand => {
            dom.clear_editor(page, input).await?;
            if !dom.exec_insert(page, input, text).await? {
                debug!(target: "site-adapters", "execCommand insertText reported false");
            }
            Ok(())
        }
        InjectStrategy::Paste => {
            dom.clear_editor(page, input).await?;
            dom.paste(page, input, text).await
        }
        InjectStrategy::NativeInsert => {
            dom.clear_editor(page, input).await?;
            dom.focus(page, input).await?;
            dom.native_insert(page, text).await
        }
    }
}

async fn await_enabled(page: PageId, deps: &RuntimeDeps<'_>) -> Result<SubmitTarget, StepFailure> {
    let profile = deps.profile;
    if profile.submit_selectors.is_empty() {
        return Ok(SubmitTarget::Enter);
    }

    let timeouts = &profile.timeouts;
    let missing_grace = (timeouts.poll() * MISSING_SUBMIT_POLLS).min(timeouts.enable());
    let started = tokio::time::Instant::now();
    let saw_disabled = AtomicBool::new(false);
    let saw = &saw_disabled;
    let dom = deps.dom;
    let selectors = &profile.submit_selectors;

    let target = poll_until(timeouts.enable(), timeouts.poll(), || async move {
        match dom.submit_state(page, selectors).await? {
            SubmitState::Enabled(selector) => Ok(Some(SubmitTarget::Click(selector))),
            SubmitState::Disabled(_) => {
                saw.store(true, Ordering::Relaxed);
                Ok(None)
            }
            SubmitState::Missing => {
                let waited = started.elapsed() >= missing_grace;
                if waited && !saw.load(Ordering::Relaxed) {
                    Ok(Some(SubmitTarget::Enter))
                } else {
                    Ok(None)
                }
            }
        }
    })
    .await
    .map_err(StepFailure::port(Stage::Enable))?;

    match target {
        Some(target) => Ok(target),
        None if !saw_disabled.load(Ordering::Relaxed) => Ok(SubmitTarget::Enter),
        None => Err(StepFailure::at(Stage::Enable)(DriverError::SubmitUnavailable {
            site: profile.id,
            waited: timeouts.enable(),
        })),
    }
}

async fn press_enter(page: PageId, input: &str, deps: &RuntimeDeps<'_>) -> Result<(), StepFailure> {
    deps.dom
        .press_enter(page, input)
        .await
        .map_err(StepFailure::port(Stage::Submit))
}

/// Focus the input, insert the prompt if the editor does not already hold it, then press Enter.
async fn fallback(
    page: PageId,
    request: &DeliveryRequest,
    expected: usize,
    deps: &RuntimeDeps<'_>,
) -> Result<usize, DriverError> {
    let dom = deps.dom;
    let input = dom
        .probe(page, &deps.profile.input_selectors)
        .await?
        .ok_or(DriverError::TargetTimeout {
            site: deps.profile.id,
            waited: Duration::ZERO,
        })?;

    dom.focus(page, &input).await?;
    let mut observed = normalized_len(&dom.read_text(page, &input).await?);
    if observed != expected {
        if observed > 0 {
            dom.clear_editor(page, &input).await?;
        }
        dom.native_insert(page, &request.prompt).await?;
        sleep(deps.profile.timeouts.settle()).await;
        observed = normalized_len(&dom.read_text(page, &input).await?);
    }
    if observed == 0 {
        return Err(DriverError::InjectionMismatch {
            site: deps.profile.id,
            expected,
            observed,
        });
    }

    dom.press_enter(page, &input)
        .await
        .map_err(|err| uncertain(deps.profile, DriverError::Port(err)))?;
    Ok(observed)
}

mod support;

use std::time::Duration;

use cdp_adapter::PageId;
use pending_store::PendingStore;
use promptrelay_core_types::{DeliveryId, SiteId};
use site_adapters::{
    normalized_len, DeliveryClaim, DeliveryRequest, DriverError, EditorKind, InjectStrategy,
    Outcome, SkipReason, SubmitPath,
};
use support::{harness, profile_with, quick_profile, FakeDom, SendButton};

fn request(site: SiteId, prompt: &str) -> DeliveryRequest {
    DeliveryRequest::direct(DeliveryId::new(), site, prompt)
}

#[tokio::test(start_paused = true)]
async fn plain_textarea_is_filled_and_clicked() {
    let h = harness(
        quick_profile(SiteId::DeepSeek),
        FakeDom::new(EditorKind::PlainText),
    );
    let page = PageId::new();

    let report = h
        .driver
        .deliver(page, request(SiteId::DeepSeek, "explain lifetimes"))
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Submitted);
    assert_eq!(report.strategy, Some(InjectStrategy::NativeSetter));
    assert_eq!(report.submit_path, Some(SubmitPath::Click));
    assert!(!report.fallback_used);
    assert_eq!(h.dom.submissions(), vec!["explain lifetimes".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn rich_text_read_back_matches_injected_length() {
    let h = harness(
        quick_profile(SiteId::ChatGpt),
        FakeDom::new(EditorKind::RichText),
    );
    let prompt = "Summarize this:\n\nLine one\nLine two  ";

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::ChatGpt, prompt))
        .await
        .unwrap();

    assert_eq!(report.strategy, Some(InjectStrategy::ExecCommand));
    assert_eq!(report.injected_len, normalized_len(prompt));
    assert_eq!(report.observed_len, Some(normalized_len(prompt)));
    assert_eq!(h.dom.submissions(), vec![prompt.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn ignored_strategies_fall_through_to_the_next() {
    let h = harness(
        profile_with(
            SiteId::Claude,
            &[
                InjectStrategy::Paste,
                InjectStrategy::ExecCommand,
                InjectStrategy::NativeInsert,
            ],
        ),
        FakeDom::new(EditorKind::RichText),
    );
    h.dom.configure(|page| {
        page.paste_handled = false;
        page.exec_insert_handled = false;
    });

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::Claude, "hello there"))
        .await
        .unwrap();

    assert_eq!(report.strategy, Some(InjectStrategy::NativeInsert));
    assert_eq!(h.dom.submissions(), vec!["hello there".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn value_setter_on_rich_editor_is_skipped_not_fatal() {
    let h = harness(
        profile_with(
            SiteId::Mistral,
            &[InjectStrategy::NativeSetter, InjectStrategy::ExecCommand],
        ),
        FakeDom::new(EditorKind::RichText),
    );

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::Mistral, "bonjour"))
        .await
        .unwrap();
    assert_eq!(report.strategy, Some(InjectStrategy::ExecCommand));
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_submit_exactly_once() {
    let h = harness(
        quick_profile(SiteId::Grok),
        FakeDom::new(EditorKind::PlainText).with_probe_delay(Duration::from_millis(50)),
    );
    let page = PageId::new();

    let (first, second) = tokio::join!(
        h.driver.deliver(page, request(SiteId::Grok, "same prompt")),
        h.driver.deliver(page, request(SiteId::Grok, "same prompt")),
    );
    let outcomes = [first.unwrap().outcome, second.unwrap().outcome];
    assert!(outcomes.contains(&Outcome::Submitted));
    assert!(outcomes.contains(&Outcome::Skipped(SkipReason::AlreadySubmitting)));
    assert_eq!(h.dom.submissions().len(), 1);

    let third = h
        .driver
        .deliver(page, request(SiteId::Grok, "same prompt"))
        .await
        .unwrap();
    assert_eq!(third.outcome, Outcome::Skipped(SkipReason::AlreadySubmitted));
    assert_eq!(h.dom.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn navigation_rearms_the_tab() {
    let h = harness(
        quick_profile(SiteId::Grok),
        FakeDom::new(EditorKind::PlainText),
    );
    let page = PageId::new();

    h.driver
        .deliver(page, request(SiteId::Grok, "one"))
        .await
        .unwrap();
    h.driver.on_navigated(page);
    let again = h
        .driver
        .deliver(page, request(SiteId::Grok, "two"))
        .await
        .unwrap();

    assert!(again.is_submitted());
    assert_eq!(h.dom.submissions(), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn missing_input_times_out_without_submitting() {
    let h = harness(
        quick_profile(SiteId::Perplexity),
        FakeDom::new(EditorKind::RichText),
    );
    h.dom.configure(|page| page.input_after_probes = None);
    let page = PageId::new();

    let err = h
        .driver
        .deliver(page, request(SiteId::Perplexity, "anyone there?"))
        .await
        .unwrap_err();

    match err {
        DriverError::TargetTimeout { site, waited } => {
            assert_eq!(site, SiteId::Perplexity);
            assert_eq!(waited, Duration::from_millis(400));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(h.dom.submissions().is_empty());
    assert!(!h.driver.guard().is_busy(page));
    assert!(!h.driver.guard().is_submitted(page));
}

#[tokio::test(start_paused = true)]
async fn late_input_is_found_by_polling() {
    let h = harness(
        quick_profile(SiteId::Gemini),
        FakeDom::new(EditorKind::RichText),
    );
    h.dom.configure(|page| page.input_after_probes = Some(5));

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::Gemini, "late bloomer"))
        .await
        .unwrap();
    assert!(report.is_submitted());
    assert!(h.dom.page.lock().unwrap().probes > 5);
}

#[tokio::test(start_paused = true)]
async fn enter_is_used_when_no_submit_control_exists() {
    let h = harness(
        quick_profile(SiteId::Grok),
        FakeDom::new(EditorKind::PlainText),
    );
    h.dom.configure(|page| page.button = SendButton::Missing);

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::Grok, "no button here"))
        .await
        .unwrap();

    assert_eq!(report.submit_path, Some(SubmitPath::Enter));
    assert_eq!(h.dom.clicks(), 0);
    assert_eq!(h.dom.submissions(), vec!["no button here".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn disabled_submit_falls_back_to_enter_once() {
    let h = harness(
        quick_profile(SiteId::AiStudio),
        FakeDom::new(EditorKind::PlainText),
    );
    h.dom.configure(|page| page.button = SendButton::AlwaysDisabled);

    let report = h
        .driver
        .deliver(PageId::new(), request(SiteId::AiStudio, "run this"))
        .await
        .unwrap();

    assert_eq!(report.submit_path, Some(SubmitPath::FallbackEnter));
    assert!(report.fallback_used);
    assert_eq!(report.strategy, None);
    assert_eq!(h.dom.page.lock().unwrap().enters, 1);
    assert_eq!(h.dom.submissions(), vec!["run this".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn lost_click_reply_is_final_and_marks_the_tab_submitted() {
    let h = harness(
        quick_profile(SiteId::ChatGpt),
        FakeDom::new(EditorKind::RichText),
    );
    h.dom.configure(|page| page.click_timeouts = 1);
    let page = PageId::new();
    let first = request(SiteId::ChatGpt, "hello");
    let id = first.id.clone();

    let err = h.driver.deliver(page, first).await.unwrap_err();

    assert!(matches!(
        err,
        DriverError::SubmitUncertain { site: SiteId::ChatGpt, .. }
    ));
    assert!(err.may_have_submitted());
    assert!(!err.is_retriable());
    assert!(h.driver.guard().is_submitted(page));
    assert_eq!(h.dom.page.lock().unwrap().enters, 0);
    assert!(h
        .store
        .snapshot()
        .locks
        .contains_key(&DeliveryClaim::key_for(&id)));

    let again = h
        .driver
        .deliver(page, request(SiteId::ChatGpt, "hello"))
        .await
        .unwrap();
    assert_eq!(again.outcome, Outcome::Skipped(SkipReason::AlreadySubmitted));
    assert_eq!(h.dom.submissions(), vec!["hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn lost_fallback_enter_reply_is_not_masked_by_the_first_error() {
    let h = harness(
        quick_profile(SiteId::AiStudio),
        FakeDom::new(EditorKind::PlainText),
    );
    h.dom.configure(|page| {
        page.button = SendButton::AlwaysDisabled;
        page.enter_timeouts = 1;
    });
    let page = PageId::new();

    let err = h
        .driver
        .deliver(page, request(SiteId::AiStudio, "run this"))
        .await
        .unwrap_err();

    assert!(err.may_have_submitted());
    assert!(!err.is_retriable());
    assert!(h.driver.guard().is_submitted(page));
    assert_eq!(h.dom.page.lock().unwrap().enters, 1);
    assert_eq!(h.dom.submissions(), vec!["run this".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unusable_editor_reports_mismatch_after_fallback() {
    let h = harness(
        quick_profile(SiteId::Kimi),
        FakeDom::new(EditorKind::RichText),
    );
    h.dom.configure(|page| {
        page.paste_handled = false;
        page.exec_insert_handled = false;
        page.native_insert_handled = false;
    });

    let err = h
        .driver
        .deliver(PageId::new(), request(SiteId::Kimi, "lost words"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DriverError::InjectionMismatch { expected: 10, observed: 0, .. }
    ));
    assert!(!err.is_retriable());
    assert_eq!(h.dom.page.lock().unwrap().enters, 0);
    assert!(h.dom.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_and_oversized_prompts_are_rejected() {
    let h = harness(
        quick_profile(SiteId::Claude),
        FakeDom::new(EditorKind::RichText),
    );
    let page = PageId::new();

    let err = h
        .driver
        .deliver(page, request(SiteId::Claude, " \n\t "))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::PromptEmpty));

    let huge = "x".repeat(100_001);
    let err = h
        .driver
        .deliver(page, request(SiteId::Claude, &huge))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::PromptTooLong(100_000)));
    assert_eq!(h.driver.guard().tracked(), 0);
}

#[tokio::test(start_paused = true)]
async fn exclusive_site_skips_while_storage_lock_is_held() {
    let h = harness(
        quick_profile(SiteId::Kimi),
        FakeDom::new(EditorKind::RichText),
    );
    let page = PageId::new();
    assert!(h
        .store
        .try_lock("deliver:kimi", "other-window", Duration::from_secs(30))
        .await
        .unwrap());

    let skipped = h
        .driver
        .deliver(page, request(SiteId::Kimi, "wait your turn"))
        .await
        .unwrap();
    assert_eq!(skipped.outcome, Outcome::Skipped(SkipReason::Locked));
    assert!(h.dom.submissions().is_empty());
    assert!(!h.driver.guard().is_busy(page));

    h.store.release("deliver:kimi", "other-window").await.unwrap();
    let report = h
        .driver
        .deliver(page, request(SiteId::Kimi, "wait your turn"))
        .await
        .unwrap();
    assert!(report.is_submitted());
    let locks = h.store.snapshot().locks;
    assert!(!locks.contains_key("deliver:kimi"));
    assert!(locks.contains_key(&DeliveryClaim::key_for(&report.id)));
}

//! Session pipeline integration tests
//!
//! Exercises the full mutation sequencing pipeline against in-memory fake
//! collaborators: tier-gated access, optimistic apply, fire-and-forget
//! preview, serialized commits, and whole-document rollback on failure.

mod support;

use std::time::Duration;
use support::*;
use toque_sdk::{
    Mutation, SectionId, StepCatalog, StudioError, Tier, FREE_STEP_LIMIT,
};

fn recipe_mutation(title: &str, ingredients: &[(&str, &str)]) -> Mutation {
    let ingredients: Vec<_> = ingredients
        .iter()
        .map(|(name, quantity)| serde_json::json!({"name": name, "quantity": quantity}))
        .collect();
    Mutation::add(
        SectionId::Recipes,
        serde_json::json!({"title": title, "ingredients": ingredients}),
    )
}

fn note_mutation(id: &str, text: &str) -> Mutation {
    Mutation::add(SectionId::Notes, serde_json::json!({"id": id, "text": text}))
}

// =============================================================================
// Scenario: Free-tier editing and first durable commit
// =============================================================================

#[tokio::test]
async fn free_user_commits_two_ingredients() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-free").await;
    assert_eq!(session.tier(), Tier::Free);

    session
        .apply_mutation(recipe_mutation("Sourdough", &[("flour", "500g")]))
        .await
        .unwrap();
    session
        .apply_mutation(Mutation::update(
            SectionId::Recipes,
            serde_json::json!({"index": 0, "item": {
                "title": "Sourdough",
                "ingredients": [
                    {"name": "flour", "quantity": "500g"},
                    {"name": "water", "quantity": "350g"},
                ],
            }}),
        ))
        .await
        .unwrap();

    let outcome = session.commit_current().await.unwrap();

    let doc = session.current_document();
    assert_eq!(doc.core().recipes[0].ingredients.len(), 2);
    assert_eq!(doc.durable_id(), Some(&outcome.identity));

    // The registry record points at a body carrying both ingredients
    let (content_ref, summary) = harness.registry.record(&outcome.identity.0).unwrap();
    assert_eq!(summary.tier, Tier::Free);
    let body = harness.content.blob(&content_ref).unwrap();
    let stored: toque_sdk::Document = serde_json::from_slice(&body).unwrap();
    assert_eq!(stored.core().recipes[0].ingredients.len(), 2);
}

// =============================================================================
// Scenario: tier gating rejects locked sections before any state change
// =============================================================================

#[tokio::test]
async fn free_user_cannot_reach_group_step() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-free").await;

    let group_step = StepCatalog::index_of(SectionId::OrganizationInfo);
    assert!(!session.can_access(group_step));

    let before = session.revision();
    let err = session
        .apply_mutation(Mutation::update(
            SectionId::OrganizationInfo,
            serde_json::json!({"name": "Brigade"}),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::AccessDenied { .. }));
    assert_eq!(session.revision(), before, "no draft change on denial");
    assert_eq!(harness.registry.write_count(), 0);
}

#[tokio::test]
async fn free_access_boundary_ignores_completed_count() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-free").await;

    for i in 0..16 {
        session.mark_completed(i);
    }
    for i in 0..FREE_STEP_LIMIT {
        assert!(session.can_access(i));
    }
    for i in FREE_STEP_LIMIT..StepCatalog::all_steps().len() {
        assert!(!session.can_access(i));
    }
}

// =============================================================================
// Scenario: registry failure rolls the whole document back
// =============================================================================

#[tokio::test]
async fn registry_failure_reverts_organization_edit() {
    let harness = Harness::with_signals(group_signals());
    let session = harness.open_session("acct:chef-group").await;
    assert_eq!(session.tier(), Tier::Group);

    let before = session.current_document();
    harness.registry.set_mode(RegistryMode::RejectWrite);

    let err = session
        .apply_mutation(
            Mutation::update(
                SectionId::OrganizationInfo,
                serde_json::json!({"name": "Brigade Collective", "address": "12 Rue des Halles"}),
            )
            .committing(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::RegistryWriteFailure(_)));
    assert_eq!(session.current_document(), before, "draft reverted");
    assert!(!session.is_busy());
    assert!(session.last_error().unwrap().contains("write rejected"));

    // One user-visible error naming the affected section
    let errors: Vec<_> = harness
        .notifier
        .messages()
        .into_iter()
        .filter(|n| n.kind == toque_sdk::NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].section, Some(SectionId::OrganizationInfo));
}

#[tokio::test]
async fn rollback_restores_pre_first_edit_state() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-free").await;

    let baseline = session.current_document();

    // Several optimistic edits accumulate before the failing commit
    session.apply_mutation(note_mutation("n1", "one")).await.unwrap();
    session.apply_mutation(note_mutation("n2", "two")).await.unwrap();
    session.apply_mutation(note_mutation("n3", "three")).await.unwrap();

    harness.registry.set_mode(RegistryMode::FailConfirm);
    session.commit_current().await.unwrap_err();

    // Not merely pre-M3: the whole window is rewound
    assert_eq!(session.current_document(), baseline);
}

#[tokio::test]
async fn upload_failure_aborts_before_registry_write() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-free").await;

    session.apply_mutation(note_mutation("n1", "one")).await.unwrap();
    harness.content.set_fail_puts(true);

    let err = session.commit_current().await.unwrap_err();
    assert!(matches!(err, StudioError::UploadFailure { .. }));
    assert_eq!(
        harness.registry.write_count(),
        0,
        "registry never reached after an upload failure"
    );
}

// =============================================================================
// Scenario: mid-session entitlement change
// =============================================================================

#[tokio::test]
async fn mint_event_unlocks_pro_steps_and_keeps_free_values() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-rising").await;

    session
        .apply_mutation(recipe_mutation("Madeleines", &[("butter", "100g")]))
        .await
        .unwrap();
    assert_eq!(session.steps().len(), FREE_STEP_LIMIT);

    let mut tier_rx = session.watch_tier();
    harness.ledger.mint("pro-1", pro_signals());

    tokio::time::timeout(Duration::from_secs(1), tier_rx.changed())
        .await
        .expect("tier change within a second")
        .unwrap();
    assert_eq!(*tier_rx.borrow(), Tier::Pro);

    // Catalog recomputed, new steps reachable
    assert!(session.steps().len() > FREE_STEP_LIMIT);
    assert!(session.can_access(StepCatalog::index_of(SectionId::Haccp)));

    // Already-entered Free values survive the reshape
    let doc = session.current_document();
    assert_eq!(doc.tier(), Tier::Pro);
    assert_eq!(doc.core().recipes[0].title, "Madeleines");

    // And the unlocked section is editable
    session
        .apply_mutation(Mutation::add(
            SectionId::Haccp,
            serde_json::json!({"hazard": "raw egg", "critical_limit": "cook to 72C"}),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn burn_event_locks_sections_and_keeps_core_values() {
    let harness = Harness::with_signals(group_signals());
    let session = harness.open_session("acct:chef-lapsing").await;
    assert_eq!(session.tier(), Tier::Group);

    session
        .apply_mutation(note_mutation("n1", "survives the downgrade"))
        .await
        .unwrap();

    let mut tier_rx = session.watch_tier();
    harness.ledger.burn("group-1", Default::default());

    tokio::time::timeout(Duration::from_secs(1), tier_rx.changed())
        .await
        .expect("tier change within a second")
        .unwrap();
    assert_eq!(*tier_rx.borrow(), Tier::Free);

    // Core values survive; the group sections are gone and locked
    let doc = session.current_document();
    assert_eq!(doc.tier(), Tier::Free);
    assert_eq!(doc.core().notes.len(), 1);
    assert!(!session.can_access(StepCatalog::index_of(SectionId::OrganizationInfo)));

    // The downgrade was announced, never silent
    assert!(harness
        .notifier
        .messages()
        .iter()
        .any(|n| n.message.contains("downgraded")));
}

#[tokio::test]
async fn ledger_read_error_degrades_to_free() {
    let harness = Harness::new();
    harness.ledger.set_fail_reads(true);

    let session = harness.open_session("acct:chef-unlucky").await;
    assert_eq!(session.tier(), Tier::Free);
    assert_eq!(session.steps().len(), FREE_STEP_LIMIT);

    // Editing still works; nothing is blocked on the broken ledger
    session.apply_mutation(note_mutation("n1", "still here")).await.unwrap();
}

// =============================================================================
// Scenario: one commit carries accumulated edits; commits are serialized
// =============================================================================

#[tokio::test]
async fn two_rapid_edits_one_commit_invocation() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-fast").await;

    session.apply_mutation(note_mutation("n1", "first")).await.unwrap();
    session.apply_mutation(note_mutation("n2", "second")).await.unwrap();

    let outcome = session.commit_current().await.unwrap();

    assert_eq!(harness.registry.write_count(), 1);
    let body = harness.content.blob(&outcome.content_ref.0).unwrap();
    let stored: toque_sdk::Document = serde_json::from_slice(&body).unwrap();
    assert_eq!(stored.core().notes.len(), 2, "both edits in one snapshot");
}

#[tokio::test]
async fn concurrent_commits_never_interleave() {
    let harness = Harness::new();
    harness.registry.set_confirm_delay(Duration::from_millis(50));

    let session = harness.open_session("acct:chef-eager").await;
    session.apply_mutation(note_mutation("n1", "one")).await.unwrap();

    let s1 = session.clone();
    let s2 = session.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { s1.commit_current().await }),
        tokio::spawn(async move { s2.commit_current().await }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    assert_eq!(harness.registry.write_count(), 2);
    assert_eq!(
        harness.registry.max_open_spans(),
        1,
        "the second commit queued instead of interleaving"
    );
    assert!(!session.is_busy());
}

// =============================================================================
// Scenario: confirmation timeout is failure
// =============================================================================

#[tokio::test]
async fn confirmation_timeout_rolls_back_and_surfaces() {
    let harness = Harness::new();
    harness.registry.set_mode(RegistryMode::HangConfirm);

    let session = harness
        .open_session_with_timeout("acct:chef-patient", Duration::from_millis(50))
        .await;
    let baseline = session.current_document();

    session.apply_mutation(note_mutation("n1", "doomed")).await.unwrap();
    let err = session.commit_current().await.unwrap_err();

    assert!(matches!(err, StudioError::ConfirmationTimeout(_)));
    assert_eq!(session.current_document(), baseline);
    assert!(!session.is_busy());
    assert!(session.last_error().is_some());
}

// =============================================================================
// Preview isolation
// =============================================================================

#[tokio::test]
async fn preview_failure_never_touches_the_draft() {
    let harness = Harness::new();
    harness.preview.set_fail(true);

    let session = harness.open_session("acct:chef-offline").await;
    session.apply_mutation(note_mutation("n1", "survives")).await.unwrap();

    // Give the fire-and-forget task time to fail
    tokio::time::sleep(Duration::from_millis(20)).await;

    let doc = session.current_document();
    assert_eq!(doc.core().notes.len(), 1);
    assert!(session.last_error().is_none(), "preview failure is not surfaced");
}

#[tokio::test]
async fn preview_receives_section_partials() {
    let harness = Harness::new();
    let session = harness.open_session("acct:chef-live").await;

    session.apply_mutation(note_mutation("n1", "hello")).await.unwrap();
    session
        .apply_mutation(recipe_mutation("Focaccia", &[("flour", "400g")]))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while harness.preview.call_count() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both preview syncs delivered");

    let calls = harness.preview.calls.lock().unwrap().clone();
    let sections: Vec<_> = calls.iter().map(|(_, s)| *s).collect();
    assert!(sections.contains(&SectionId::Notes));
    assert!(sections.contains(&SectionId::Recipes));
}

use proptest::prelude::*;
use std::time::Duration;
use tms_core::{
    ApplicationStatus, DiligenceStatus, EntityKind, LifecycleError, OfferStage, RecognitionStatus,
    StatusMachine,
};
use tms_gateway::MockGateway;
use tms_lifecycle::Reconciler;
use tms_test_utils::fixtures::{
    application, facilitator, offer, pending_application, recognition_record, startup_owner,
};
use tms_test_utils::generators::{
    arb_application_status, arb_diligence_status, arb_fee_type, arb_offer_stage,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

#[tokio::test]
async fn concurrent_accepts_issue_one_gateway_call() {
    let app = pending_application("app-1");
    let gateway = MockGateway::new();
    gateway.seed_record(&app).unwrap();
    gateway.set_latency(Duration::from_millis(20));
    let reconciler = Reconciler::new(gateway.clone());
    let principal = facilitator();

    let (first, second) = tokio::join!(
        reconciler.accept_application(&principal, &app),
        reconciler.accept_application(&principal, &app),
    );

    assert_eq!(first.unwrap().status, ApplicationStatus::Accepted);
    assert!(matches!(second, Err(LifecycleError::ActionInFlight { .. })));
    assert_eq!(gateway.call_count(), 1);
    assert!(!reconciler.is_in_flight(EntityKind::Application, "app-1"));
}

#[tokio::test]
async fn actions_on_different_records_run_concurrently() {
    let gateway = MockGateway::new();
    for id in ["app-1", "app-2"] {
        gateway.seed_record(&pending_application(id)).unwrap();
    }
    gateway.set_latency(Duration::from_millis(10));
    let reconciler = Reconciler::new(gateway.clone());
    let principal = facilitator();
    let (a, b) = (pending_application("app-1"), pending_application("app-2"));

    let (first, second) = tokio::join!(
        reconciler.accept_application(&principal, &a),
        reconciler.reject_application(&principal, &b),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn guard_released_after_failure() {
    let app = pending_application("app-1");
    let gateway = MockGateway::new();
    gateway.seed_record(&app).unwrap();
    gateway.fail_next(tms_core::GatewayError::Network {
        reason: "timeout".to_string(),
    });
    let reconciler = Reconciler::new(gateway.clone());

    assert!(reconciler.accept_application(&facilitator(), &app).await.is_err());
    assert!(reconciler.accept_application(&facilitator(), &app).await.is_ok());
    assert_eq!(gateway.call_count(), 2);
}

proptest! {
    #[test]
    fn diligence_request_succeeds_only_from_open_states(
        status in arb_application_status(),
        diligence in arb_diligence_status(),
    ) {
        let app = application("app-1", status, diligence);
        let gateway = MockGateway::new();
        gateway.seed_record(&app).unwrap();
        let reconciler = Reconciler::new(gateway.clone());

        let result = runtime().block_on(reconciler.request_diligence(&facilitator(), &app));

        let legal = status == ApplicationStatus::Pending
            && diligence.can_transition_to(DiligenceStatus::Requested);
        if legal {
            let updated = result.unwrap();
            prop_assert_eq!(updated.diligence_status, DiligenceStatus::Requested);
            prop_assert_eq!(gateway.mutation_count(), 1);
        } else {
            let refused = matches!(result, Err(LifecycleError::InvalidTransition { .. }));
            prop_assert!(refused);
            prop_assert_eq!(gateway.call_count(), 0);
        }
    }

    #[test]
    fn accept_offer_never_hides_contact_details(stage in arb_offer_stage(), revealed in any::<bool>()) {
        let mut record = offer("offer-1", stage);
        record.contact_details_revealed = revealed || stage == OfferStage::Accepted;
        let gateway = MockGateway::new();
        gateway.seed_record(&record).unwrap();
        let reconciler = Reconciler::new(gateway.clone());

        let result = runtime().block_on(reconciler.accept_investment_offer(&startup_owner(), &record));

        match result {
            Ok(accepted) => {
                prop_assert_eq!(stage, OfferStage::ReadyForReview);
                prop_assert!(accepted.contact_details_revealed);
            }
            Err(err) => {
                prop_assert!(err.is_local());
                prop_assert_eq!(gateway.call_count(), 0);
            }
        }
    }

    #[test]
    fn approved_recognition_costs_no_calls(fee_type in arb_fee_type()) {
        let record = recognition_record("rec-1", fee_type, RecognitionStatus::Approved);
        let gateway = MockGateway::new();
        let reconciler = Reconciler::new(gateway.clone());

        let rt = runtime();
        let first = rt.block_on(reconciler.approve_recognition_record(&facilitator(), &record)).unwrap();
        let second = rt.block_on(reconciler.approve_recognition_record(&facilitator(), &first)).unwrap();

        prop_assert_eq!(&first, &record);
        prop_assert_eq!(&second, &record);
        prop_assert_eq!(gateway.call_count(), 0);
    }
}

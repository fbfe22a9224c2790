//! One mounted dashboard: local stores, reconciler, preferences and notifications.
//!
//! Every action looks up the local copy by id, hands it to the
//! [`Reconciler`] and applies the authoritative result to the local
//! stores. Failures leave the stores untouched (except a conflict, which
//! installs the re-fetched record) and raise exactly one notification.
//! Results that arrive after [`DashboardSession::unmount`] are dropped.

use crate::config::DashboardConfig;
use crate::error::{ClientError, ClientResult};
use crate::notifications::{
    Notification, NotificationAction, NotificationLevel, NotificationQueue,
};
use crate::persistence::{self, ListKind, ViewPreferences};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tms_core::{
    AnyRecord, Application, ApplicationId, DocumentSlot, EntityKind, GatewayError,
    InvestmentOffer, InvitationId, InvitationStatus, LifecycleAction, LifecycleError, Message,
    OfferId, Principal, RecognitionId, Reconcilable, RecognitionRecord, RecordIdType, Role,
    StartupInvitation,
};
use tms_gateway::{ChangeFeed, FeedFilter, MutationGateway};
use tms_lifecycle::{document_path, Reconciler};
use tms_sync::{
    spawn_change_listener, LocalState, ReconnectPolicy, Subscription, SyncMessage,
    DEFAULT_ECHO_WINDOW,
};
use tms_view::{
    invitation_page, newest_first, order_applications, recognition_page, review_queue,
    startup_offers, ApplicationFilter, OfferFilter, Page, RecognitionFilter, DEFAULT_PAGE_SIZE,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SYNC_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SETTINGS AND MOUNT GUARD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub echo_window: Duration,
    pub reconnect: ReconnectPolicy,
    pub page_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            echo_window: DEFAULT_ECHO_WINDOW,
            reconnect: ReconnectPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl From<&DashboardConfig> for SessionSettings {
    fn from(config: &DashboardConfig) -> Self {
        config.session_settings()
    }
}

/// Shared "still mounted" flag.
#[derive(Debug, Clone)]
pub struct MountGuard {
    mounted: Arc<AtomicBool>,
}

impl Default for MountGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl MountGuard {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }
}

/// An owned, paged list ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView<T> {
    pub items: Vec<T>,
    /// Items behind the "show more" control.
    pub hidden: usize,
}

impl<T: Clone> From<Page<'_, T>> for ListView<T> {
    fn from(page: Page<'_, T>) -> Self {
        Self {
            items: page.items.into_iter().cloned().collect(),
            hidden: page.hidden,
        }
    }
}

/// Change-feed subscriptions a principal's dashboard needs.
pub fn default_subscriptions(principal: &Principal) -> Vec<Subscription> {
    match (principal.role, &principal.startup_id) {
        (Role::Startup, Some(startup_id)) => {
            let own = || FeedFilter::eq("startup_id", startup_id.as_str());
            vec![
                Subscription::filtered(EntityKind::Application, own()),
                Subscription::filtered(EntityKind::InvestmentOffer, own()),
                Subscription::filtered(EntityKind::CoInvestmentOffer, own()),
                Subscription::filtered(EntityKind::RecognitionRecord, own()),
                Subscription::all(EntityKind::Message),
            ]
        }
        (Role::Facilitator, _) => vec![
            Subscription::all(EntityKind::Application),
            Subscription::all(EntityKind::RecognitionRecord),
            Subscription::filtered(
                EntityKind::StartupInvitation,
                FeedFilter::eq("facilitator_id", principal.user_id.as_str()),
            ),
            Subscription::all(EntityKind::Message),
        ],
        (Role::Investor, _) => vec![
            Subscription::filtered(
                EntityKind::InvestmentOffer,
                FeedFilter::eq("investor_id", principal.user_id.as_str()),
            ),
            Subscription::filtered(
                EntityKind::CoInvestmentOffer,
                FeedFilter::eq("investor_id", principal.user_id.as_str()),
            ),
        ],
        _ => vec![
            Subscription::all(EntityKind::InvestmentOffer),
            Subscription::all(EntityKind::CoInvestmentOffer),
        ],
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct DashboardSession<G> {
    principal: Principal,
    reconciler: Reconciler<G>,
    state: Mutex<LocalState>,
    preferences: Mutex<ViewPreferences>,
    notifications: Mutex<NotificationQueue>,
    mount: MountGuard,
    reconnect: ReconnectPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<G: MutationGateway> DashboardSession<G> {
    pub fn new(gateway: G, principal: Principal, settings: SessionSettings) -> Self {
        Self {
            principal,
            reconciler: Reconciler::new(gateway),
            state: Mutex::new(LocalState::new(settings.echo_window)),
            preferences: Mutex::new(ViewPreferences::with_page_size(settings.page_size)),
            notifications: Mutex::new(NotificationQueue::new()),
            mount: MountGuard::new(),
            reconnect: settings.reconnect,
        }
    }

    pub fn with_preferences(self, preferences: ViewPreferences) -> Self {
        *lock(&self.preferences) = preferences;
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn reconciler(&self) -> &Reconciler<G> {
        &self.reconciler
    }

    pub fn mount_guard(&self) -> MountGuard {
        self.mount.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    /// Stop applying results and sync events. In-flight calls still complete.
    pub fn unmount(&self) {
        tracing::debug!(user = %self.principal.user_id, "Dashboard unmounted");
        self.mount.unmount();
    }

    /// Read the local stores.
    pub fn read_state<R>(&self, f: impl FnOnce(&LocalState) -> R) -> R {
        f(&lock(&self.state))
    }

    /// Mutate the local stores directly, e.g. to seed an initial load.
    pub fn update_state<R>(&self, f: impl FnOnce(&mut LocalState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    pub fn take_notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).drain()
    }

    pub fn latest_notification(&self) -> Option<Notification> {
        lock(&self.notifications).latest().cloned()
    }

    fn notify(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }

    // ------------------------------------------------------------------------
    // Result handling
    // ------------------------------------------------------------------------

    fn settle<T>(
        &self,
        action: LifecycleAction,
        entity: EntityKind,
        id: &str,
        result: Result<T, LifecycleError>,
        apply: impl FnOnce(&mut LocalState, &T),
    ) -> ClientResult<T> {
        if !self.mount.is_mounted() {
            tracing::debug!(action = %action, entity = %entity, id, "Result dropped after unmount");
            return Err(ClientError::Unmounted);
        }
        match result {
            Ok(value) => {
                apply(&mut lock(&self.state), &value);
                tracing::info!(action = %action, entity = %entity, id, "Action applied");
                Ok(value)
            }
            Err(err) => {
                self.fail(action, entity, id, &err);
                Err(err.into())
            }
        }
    }

    fn fail(&self, action: LifecycleAction, entity: EntityKind, id: &str, err: &LifecycleError) {
        if let LifecycleError::Conflict { refreshed, .. } = err {
            let mut state = lock(&self.state);
            match refreshed {
                Some(record) => state.replace_authoritative((**record).clone()),
                None => {
                    state.remove_authoritative(entity, id);
                }
            }
        }

        if err.is_local() {
            tracing::debug!(action = %action, entity = %entity, id, error = %err, "Action refused");
        } else {
            tracing::warn!(action = %action, entity = %entity, id, error = %err, "Action failed");
        }

        let mut notification =
            Notification::new(NotificationLevel::Error, err.user_message(action, entity));
        if matches!(err, LifecycleError::Gateway(GatewayError::Network { .. })) {
            notification = notification.with_action(NotificationAction::Retry);
        }
        self.notify(notification);
    }

    fn unknown(&self, action: LifecycleAction, entity: EntityKind, id: &str) -> ClientError {
        self.notify(Notification::new(
            NotificationLevel::Error,
            format!(
                "Could not {} {}: it is no longer available. No changes were made.",
                action.verb(),
                entity.label()
            ),
        ));
        ClientError::UnknownRecord {
            entity,
            id: id.to_string(),
        }
    }

    fn application(&self, id: &ApplicationId, action: LifecycleAction) -> ClientResult<Application> {
        let found = lock(&self.state).applications.get(id).cloned();
        found.ok_or_else(|| self.unknown(action, EntityKind::Application, id.as_str()))
    }

    fn offer(&self, id: &OfferId, action: LifecycleAction) -> ClientResult<InvestmentOffer> {
        let found = lock(&self.state).offers.get(id).cloned();
        found.ok_or_else(|| self.unknown(action, EntityKind::InvestmentOffer, id.as_str()))
    }

    fn recognition(
        &self,
        id: &RecognitionId,
        action: LifecycleAction,
    ) -> ClientResult<RecognitionRecord> {
        let found = lock(&self.state).recognitions.get(id).cloned();
        found.ok_or_else(|| self.unknown(action, EntityKind::RecognitionRecord, id.as_str()))
    }

    fn invitation(
        &self,
        id: &InvitationId,
        action: LifecycleAction,
    ) -> ClientResult<StartupInvitation> {
        let found = lock(&self.state).invitations.get(id).cloned();
        found.ok_or_else(|| self.unknown(action, EntityKind::StartupInvitation, id.as_str()))
    }

    fn install<T: Clone + Into<AnyRecord>>(state: &mut LocalState, record: &T) {
        state.replace_authoritative(record.clone().into());
    }

    // ------------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------------

    pub async fn accept_application(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::AcceptApplication;
        let app = self.application(id, action)?;
        let result = self.reconciler.accept_application(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn reject_application(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::RejectApplication;
        let app = self.application(id, action)?;
        let result = self.reconciler.reject_application(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn withdraw_application(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::WithdrawApplication;
        let app = self.application(id, action)?;
        let result = self.reconciler.withdraw_application(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn request_diligence(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::RequestDiligence;
        let app = self.application(id, action)?;
        let result = self.reconciler.request_diligence(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn approve_diligence(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::ApproveDiligence;
        let app = self.application(id, action)?;
        let result = self.reconciler.approve_diligence(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn reject_diligence(&self, id: &ApplicationId) -> ClientResult<Application> {
        let action = LifecycleAction::RejectDiligence;
        let app = self.application(id, action)?;
        let result = self.reconciler.reject_diligence(&self.principal, &app).await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    pub async fn attach_document(
        &self,
        id: &ApplicationId,
        slot: DocumentSlot,
        file_name: &str,
        blob: Vec<u8>,
    ) -> ClientResult<Application> {
        let action = LifecycleAction::AttachDocument;
        let app = self.application(id, action)?;
        tracing::debug!(path = %document_path(slot, &app, file_name), size = blob.len(), "Uploading document");
        let result = self
            .reconciler
            .attach_document(&self.principal, &app, slot, file_name, blob)
            .await;
        self.settle(action, EntityKind::Application, id.as_str(), result, Self::install)
    }

    // ------------------------------------------------------------------------
    // Offers
    // ------------------------------------------------------------------------

    pub async fn accept_offer(&self, id: &OfferId) -> ClientResult<InvestmentOffer> {
        let action = LifecycleAction::AcceptOffer;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.accept_investment_offer(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, Self::install)
    }

    pub async fn reject_offer(&self, id: &OfferId) -> ClientResult<InvestmentOffer> {
        let action = LifecycleAction::RejectOffer;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.reject_investment_offer(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, Self::install)
    }

    pub async fn advance_offer(&self, id: &OfferId) -> ClientResult<InvestmentOffer> {
        let action = LifecycleAction::AdvanceOfferStage;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.advance_offer_stage(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, Self::install)
    }

    pub async fn approve_co_investment(&self, id: &OfferId) -> ClientResult<InvestmentOffer> {
        let action = LifecycleAction::ApproveCoInvestment;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.approve_co_investment(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, Self::install)
    }

    pub async fn reject_co_investment(&self, id: &OfferId) -> ClientResult<InvestmentOffer> {
        let action = LifecycleAction::RejectCoInvestment;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.reject_co_investment(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, Self::install)
    }

    pub async fn delete_offer(&self, id: &OfferId) -> ClientResult<()> {
        let action = LifecycleAction::DeleteOffer;
        let offer = self.offer(id, action)?;
        let result = self.reconciler.delete_investment_offer(&self.principal, &offer).await;
        self.settle(action, offer.entity_kind(), id.as_str(), result, |state, _| {
            state.offers.remove_authoritative(id);
        })
    }

    // ------------------------------------------------------------------------
    // Recognition and invitations
    // ------------------------------------------------------------------------

    pub async fn approve_recognition(&self, id: &RecognitionId) -> ClientResult<RecognitionRecord> {
        let action = LifecycleAction::ApproveRecognition;
        let record = self.recognition(id, action)?;
        let result = self
            .reconciler
            .approve_recognition_record(&self.principal, &record)
            .await;
        self.settle(action, EntityKind::RecognitionRecord, id.as_str(), result, Self::install)
    }

    pub async fn invite_startup(
        &self,
        startup_name: &str,
        contact_email: &str,
    ) -> ClientResult<StartupInvitation> {
        let action = LifecycleAction::InviteStartup;
        let result = self
            .reconciler
            .invite_startup(&self.principal, startup_name, contact_email)
            .await;
        self.settle(action, EntityKind::StartupInvitation, contact_email, result, Self::install)
    }

    pub async fn advance_invitation(
        &self,
        id: &InvitationId,
        next: InvitationStatus,
    ) -> ClientResult<StartupInvitation> {
        let action = LifecycleAction::AdvanceInvitation;
        let invitation = self.invitation(id, action)?;
        let result = self
            .reconciler
            .advance_invitation(&self.principal, &invitation, next)
            .await;
        self.settle(action, EntityKind::StartupInvitation, id.as_str(), result, Self::install)
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    /// Show the message at once, then confirm or withdraw it once the
    /// backend answers.
    pub async fn send_message(
        &self,
        application_id: &ApplicationId,
        text: &str,
    ) -> ClientResult<Message> {
        let action = LifecycleAction::SendMessage;
        let app = self.application(application_id, action)?;
        let draft = Message::optimistic(
            application_id.clone(),
            self.principal.user_id.clone(),
            text,
            Utc::now(),
        );
        lock(&self.state).messages.push_optimistic(draft.clone());

        let result = self.reconciler.send_message(&self.principal, &app, &draft).await;
        if result.is_err() && self.mount.is_mounted() {
            lock(&self.state).messages.discard(&draft.id);
        }
        self.settle(action, EntityKind::Message, draft.id.as_str(), result, |state, sent| {
            state.messages.confirm(&draft.id, sent.clone());
        })
    }

    pub fn thread(&self, application_id: &ApplicationId) -> Vec<Message> {
        lock(&self.state)
            .messages
            .thread(application_id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Realtime sync
    // ------------------------------------------------------------------------

    /// Spawn the change listener for `subscriptions`.
    pub fn start_sync(
        &self,
        feed: Arc<dyn ChangeFeed>,
        subscriptions: Vec<Subscription>,
    ) -> (mpsc::Receiver<SyncMessage>, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(SYNC_CHANNEL_CAPACITY);
        let handles = spawn_change_listener(feed, subscriptions, self.reconnect, sender);
        (receiver, handles)
    }

    /// Apply listener messages until the channel closes or the session unmounts.
    pub async fn run_sync(&self, mut receiver: mpsc::Receiver<SyncMessage>) {
        while let Some(message) = receiver.recv().await {
            if !self.mount.is_mounted() {
                break;
            }
            self.handle_sync(message);
        }
    }

    pub fn handle_sync(&self, message: SyncMessage) {
        if !self.mount.is_mounted() {
            return;
        }
        match message {
            SyncMessage::Connected { entity } => {
                tracing::info!(entity = %entity, "Live updates connected");
            }
            SyncMessage::Change(event) => match lock(&self.state).ingest(&event) {
                Ok(applied) => {
                    tracing::debug!(entity = %event.entity, operation = ?event.operation, applied = ?applied, "Change applied");
                }
                Err(err) => {
                    tracing::warn!(entity = %event.entity, error = %err, "Change event rejected");
                }
            },
            SyncMessage::Disconnected { entity, reason } => {
                self.notify(
                    Notification::new(
                        NotificationLevel::Warning,
                        format!("Live updates for {} paused: {}", entity.label(), reason),
                    )
                    .with_action(NotificationAction::Reconnect),
                );
            }
            SyncMessage::Error { entity, message } => {
                self.notify(
                    Notification::new(
                        NotificationLevel::Warning,
                        format!("Live updates for {} unavailable: {}", entity.label(), message),
                    )
                    .with_action(NotificationAction::Reconnect),
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Views and preferences
    // ------------------------------------------------------------------------

    pub fn application_list(&self, filter: &ApplicationFilter) -> ListView<Application> {
        let state = lock(&self.state);
        let preferences = lock(&self.preferences);
        let chain = filter.chain(&preferences.favorites);
        let ordered = order_applications(chain.apply(state.applications.iter()));
        Page::new(ordered, &preferences.applications).into()
    }

    /// Offers visible to this principal. Startups only see surfaced offers.
    pub fn offer_list(&self, filter: &OfferFilter) -> ListView<InvestmentOffer> {
        let state = lock(&self.state);
        let preferences = lock(&self.preferences);
        let visible = match (&self.principal.role, &self.principal.startup_id) {
            (Role::Startup, Some(startup_id)) => startup_offers(state.offers.iter(), startup_id),
            (Role::Startup, None) => Vec::new(),
            _ => newest_first(state.offers.iter()),
        };
        let chain = filter.chain(&preferences.favorites);
        let kept = chain.apply(visible);
        Page::new(kept, &preferences.offers).into()
    }

    /// Offers awaiting this principal's decision.
    pub fn review_queue(&self) -> Vec<InvestmentOffer> {
        let state = lock(&self.state);
        review_queue(state.offers.iter(), &self.principal)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn recognition_list(&self, filter: &RecognitionFilter) -> ListView<RecognitionRecord> {
        let state = lock(&self.state);
        let preferences = lock(&self.preferences);
        let kept = filter.chain().apply(state.recognitions.iter());
        recognition_page(kept, &preferences.recognitions).into()
    }

    pub fn invitation_list(&self) -> ListView<StartupInvitation> {
        let state = lock(&self.state);
        let preferences = lock(&self.preferences);
        invitation_page(state.invitations.iter(), &preferences.invitations).into()
    }

    /// Star or unstar a record; returns whether it is now a favorite.
    pub fn toggle_favorite(&self, id: &str) -> bool {
        lock(&self.preferences).favorites.toggle(id)
    }

    pub fn toggle_show_more(&self, list: ListKind) {
        lock(&self.preferences).list_mut(list).toggle();
    }

    pub fn preferences(&self) -> ViewPreferences {
        lock(&self.preferences).clone()
    }

    pub fn save_preferences(&self, path: &Path) -> ClientResult<()> {
        persistence::save(path, &self.preferences())?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::{ApplicationStatus, DiligenceStatus, OfferStage};
    use tms_gateway::MockGateway;
    use tms_test_utils::fixtures::{application, facilitator, offer, pending_application, startup_owner};

    fn session(gateway: &MockGateway) -> DashboardSession<MockGateway> {
        DashboardSession::new(gateway.clone(), facilitator(), SessionSettings::default())
    }

    #[tokio::test]
    async fn test_accept_updates_local_store() {
        let gateway = MockGateway::new();
        let app = pending_application("app-1");
        gateway.seed_record(&app).unwrap();
        let session = session(&gateway);
        session.update_state(|s| s.applications.seed([app.clone()]));

        let accepted = session.accept_application(&app.id).await.unwrap();

        assert_eq!(accepted.status, ApplicationStatus::Accepted);
        let local = session.read_state(|s| s.applications.get(&app.id).cloned()).unwrap();
        assert_eq!(local.status, ApplicationStatus::Accepted);
        assert!(session.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_refused_action_notifies_once_and_keeps_state() {
        let gateway = MockGateway::new();
        let app = application("app-1", ApplicationStatus::Accepted, DiligenceStatus::None);
        let session = session(&gateway);
        session.update_state(|s| s.applications.seed([app.clone()]));

        let err = session.request_diligence(&app.id).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Lifecycle(LifecycleError::InvalidTransition { .. })
        ));
        let notes = session.take_notifications();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.ends_with("No changes were made."));
        let local = session.read_state(|s| s.applications.get(&app.id).cloned()).unwrap();
        assert_eq!(local, app);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_record_notifies() {
        let gateway = MockGateway::new();
        let session = session(&gateway);
        let err = session
            .accept_application(&ApplicationId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnknownRecord { .. }));
        assert_eq!(session.take_notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_offers_retry() {
        let gateway = MockGateway::new();
        let app = pending_application("app-1");
        gateway.seed_record(&app).unwrap();
        gateway.fail_next(GatewayError::Network {
            reason: "timeout".to_string(),
        });
        let session = session(&gateway);
        session.update_state(|s| s.applications.seed([app.clone()]));

        assert!(session.accept_application(&app.id).await.is_err());
        let note = session.latest_notification().unwrap();
        assert_eq!(note.action, Some(NotificationAction::Retry));
        let local = session.read_state(|s| s.applications.get(&app.id).cloned()).unwrap();
        assert_eq!(local.status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_delete_removes_local_offer() {
        let gateway = MockGateway::new();
        let record = offer("offer-1", OfferStage::Rejected);
        gateway.seed_record(&record).unwrap();
        let session = DashboardSession::new(gateway.clone(), startup_owner(), SessionSettings::default());
        session.update_state(|s| s.offers.seed([record.clone()]));

        session.delete_offer(&record.id).await.unwrap();

        assert!(session.read_state(|s| s.offers.is_empty()));
    }

    #[test]
    fn test_disconnect_raises_reconnect_notification() {
        let session = session(&MockGateway::new());
        session.handle_sync(SyncMessage::Disconnected {
            entity: EntityKind::Application,
            reason: "socket closed".to_string(),
        });
        let note = session.latest_notification().unwrap();
        assert_eq!(note.level, NotificationLevel::Warning);
        assert_eq!(note.action, Some(NotificationAction::Reconnect));
    }

    #[test]
    fn test_subscriptions_scoped_to_startup() {
        let subs = default_subscriptions(&startup_owner());
        assert!(subs
            .iter()
            .filter(|s| s.entity != EntityKind::Message)
            .all(|s| s.filter.as_ref().is_some_and(|f| f.column == "startup_id")));
    }

    #[test]
    fn test_mount_guard_shared() {
        let session = session(&MockGateway::new());
        let guard = session.mount_guard();
        assert!(guard.is_mounted());
        session.unmount();
        assert!(!guard.is_mounted());
    }
}

//! Composable list filters.
//!
//! A [`FilterChain`] keeps a record only if every filter in it matches, so
//! the result does not depend on the order filters were added in. The
//! per-list filter structs below hold the user's current selections and
//! build the chain.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tms_core::{
    Application, ApplicationStatus, FeeType, InvestmentOffer, OfferStatus, OpportunityId,
    Reconcilable, RecognitionRecord, RecordIdType, StartupId,
};

// ============================================================================
// FILTER
// ============================================================================

/// A named pure predicate over records of type `T`.
pub struct Filter<T> {
    name: &'static str,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
    pub fn new<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, record: &T) -> bool {
        (self.predicate)(record)
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish()
    }
}

/// Conjunction of filters.
#[derive(Debug, Clone)]
pub struct FilterChain<T> {
    filters: Vec<Filter<T>>,
}

impl<T> Default for FilterChain<T> {
    fn default() -> Self {
        Self { filters: Vec::new() }
    }
}

impl<T> FilterChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Filter<T>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter<T>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches(&self, record: &T) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }

    /// Keep the matching records, preserving input order.
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a T>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        records.into_iter().filter(|record| self.matches(record)).collect()
    }
}

// ============================================================================
// FILTER CONSTRUCTORS
// ============================================================================

/// Records scoped to one startup.
pub trait StartupScoped {
    fn startup_id(&self) -> &StartupId;
}

impl StartupScoped for Application {
    fn startup_id(&self) -> &StartupId {
        &self.startup_id
    }
}

impl StartupScoped for InvestmentOffer {
    fn startup_id(&self) -> &StartupId {
        &self.startup_id
    }
}

impl StartupScoped for RecognitionRecord {
    fn startup_id(&self) -> &StartupId {
        &self.startup_id
    }
}

pub fn by_opportunity(opportunity_id: OpportunityId) -> Filter<Application> {
    Filter::new("opportunity", move |app: &Application| app.opportunity_id == opportunity_id)
}

pub fn by_application_status(status: ApplicationStatus) -> Filter<Application> {
    Filter::new("application_status", move |app: &Application| app.status == status)
}

pub fn by_fee_type(fee_type: FeeType) -> Filter<RecognitionRecord> {
    Filter::new("fee_type", move |record: &RecognitionRecord| record.fee_type == fee_type)
}

/// Records whose fee type is any of `fee_types`.
pub fn by_fee_types(fee_types: impl IntoIterator<Item = FeeType>) -> Filter<RecognitionRecord> {
    let allowed: HashSet<FeeType> = fee_types.into_iter().collect();
    Filter::new("fee_types", move |record: &RecognitionRecord| allowed.contains(&record.fee_type))
}

pub fn by_offer_status(status: OfferStatus) -> Filter<InvestmentOffer> {
    Filter::new("offer_status", move |offer: &InvestmentOffer| offer.status() == status)
}

pub fn by_startup<T: StartupScoped + 'static>(startup_id: StartupId) -> Filter<T> {
    Filter::new("startup", move |record: &T| record.startup_id() == &startup_id)
}

/// Only records the user starred.
pub fn by_favorite<T: Reconcilable>(favorites: &Favorites) -> Filter<T> {
    let ids = favorites.ids.clone();
    Filter::new("favorite", move |record: &T| ids.contains(record.id().as_str()))
}

// ============================================================================
// FAVORITES
// ============================================================================

/// Record ids the user starred.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    ids: HashSet<String>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Flip the star on `id`; returns whether it is now a favorite.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// LIST FILTER SELECTIONS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub opportunity_id: Option<OpportunityId>,
    pub status: Option<ApplicationStatus>,
    pub startup_id: Option<StartupId>,
    pub favorites_only: bool,
}

impl ApplicationFilter {
    pub fn chain(&self, favorites: &Favorites) -> FilterChain<Application> {
        let mut chain = FilterChain::new();
        if let Some(opportunity_id) = &self.opportunity_id {
            chain.push(by_opportunity(opportunity_id.clone()));
        }
        if let Some(status) = self.status {
            chain.push(by_application_status(status));
        }
        if let Some(startup_id) = &self.startup_id {
            chain.push(by_startup(startup_id.clone()));
        }
        if self.favorites_only {
            chain.push(by_favorite(favorites));
        }
        chain
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionFilter {
    pub fee_type: Option<FeeType>,
    pub startup_id: Option<StartupId>,
}

impl RecognitionFilter {
    pub fn chain(&self) -> FilterChain<RecognitionRecord> {
        let mut chain = FilterChain::new();
        if let Some(fee_type) = self.fee_type {
            chain.push(by_fee_type(fee_type));
        }
        if let Some(startup_id) = &self.startup_id {
            chain.push(by_startup(startup_id.clone()));
        }
        chain
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferFilter {
    pub status: Option<OfferStatus>,
    pub startup_id: Option<StartupId>,
    pub favorites_only: bool,
}

impl OfferFilter {
    pub fn chain(&self, favorites: &Favorites) -> FilterChain<InvestmentOffer> {
        let mut chain = FilterChain::new();
        if let Some(status) = self.status {
            chain.push(by_offer_status(status));
        }
        if let Some(startup_id) = &self.startup_id {
            chain.push(by_startup(startup_id.clone()));
        }
        if self.favorites_only {
            chain.push(by_favorite(favorites));
        }
        chain
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::{DiligenceStatus, OfferStage, RecognitionStatus};
    use tms_test_utils::fixtures::{application, offer, recognition_record};

    fn apps() -> Vec<Application> {
        let mut a = application("app-1", ApplicationStatus::Pending, DiligenceStatus::None);
        a.opportunity_id = OpportunityId::new("opp-1");
        let mut b = application("app-2", ApplicationStatus::Accepted, DiligenceStatus::None);
        b.opportunity_id = OpportunityId::new("opp-1");
        let mut c = application("app-3", ApplicationStatus::Pending, DiligenceStatus::None);
        c.opportunity_id = OpportunityId::new("opp-2");
        vec![a, b, c]
    }

    fn ids(records: Vec<&Application>) -> Vec<&str> {
        records.into_iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_empty_chain_keeps_everything() {
        let apps = apps();
        assert_eq!(FilterChain::new().apply(&apps).len(), 3);
    }

    #[test]
    fn test_chain_is_conjunction() {
        let apps = apps();
        let chain = FilterChain::new()
            .with(by_opportunity(OpportunityId::new("opp-1")))
            .with(by_application_status(ApplicationStatus::Pending));
        assert_eq!(ids(chain.apply(&apps)), vec!["app-1"]);
    }

    #[test]
    fn test_favorites_filter() {
        let apps = apps();
        let mut favorites = Favorites::new();
        assert!(favorites.toggle("app-3"));
        let filter = ApplicationFilter {
            favorites_only: true,
            ..ApplicationFilter::default()
        };
        assert_eq!(ids(filter.chain(&favorites).apply(&apps)), vec!["app-3"]);
        assert!(!favorites.toggle("app-3"));
        assert!(filter.chain(&favorites).apply(&apps).is_empty());
    }

    #[test]
    fn test_recognition_fee_type_filter() {
        let records = vec![
            recognition_record("r-1", FeeType::Equity, RecognitionStatus::Pending),
            recognition_record("r-2", FeeType::Free, RecognitionStatus::Approved),
        ];
        let filter = RecognitionFilter {
            fee_type: Some(FeeType::Equity),
            ..RecognitionFilter::default()
        };
        let kept = filter.chain().apply(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "r-1");
    }

    #[test]
    fn test_fee_type_set_filter() {
        let records = vec![
            recognition_record("r-1", FeeType::Equity, RecognitionStatus::Pending),
            recognition_record("r-2", FeeType::Free, RecognitionStatus::Approved),
            recognition_record("r-3", FeeType::Hybrid, RecognitionStatus::Pending),
        ];
        let chain = FilterChain::new().with(by_fee_types([FeeType::Equity, FeeType::Hybrid]));
        let kept: Vec<&str> = chain.apply(&records).into_iter().map(|r| r.id.as_str()).collect();
        assert_eq!(kept, vec!["r-1", "r-3"]);
    }

    #[test]
    fn test_offer_status_filter() {
        let offers = vec![
            offer("o-1", OfferStage::Accepted),
            offer("o-2", OfferStage::InvestorAdvisorReview),
            offer("o-3", OfferStage::Rejected),
        ];
        let chain = FilterChain::new().with(by_offer_status(OfferStatus::Pending));
        let kept = chain.apply(&offers);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id.as_str(), "o-2");
    }

    #[test]
    fn test_filter_debug_names() {
        let filter = by_fee_type(FeeType::Hybrid);
        assert_eq!(filter.name(), "fee_type");
        assert!(format!("{:?}", filter).contains("fee_type"));
    }
}

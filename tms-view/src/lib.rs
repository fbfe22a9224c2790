//! TrackMyStartup View Projections
//!
//! Pure functions from local record sets to what a dashboard list shows:
//! ordering, composable filters, "show more" paging and per-role offer
//! projections. Nothing here touches the network or mutates records.

pub mod filters;
pub mod ordering;
pub mod projections;
pub mod show_more;

pub use filters::{
    by_application_status, by_favorite, by_fee_type, by_fee_types, by_offer_status,
    by_opportunity, by_startup, ApplicationFilter, Favorites, Filter, FilterChain, OfferFilter,
    RecognitionFilter, StartupScoped,
};
pub use ordering::{newest_first, order_applications};
pub use projections::{
    invitation_page, recognition_page, review_queue, startup_offers, visible_contact,
    ContactDetails, Page,
};
pub use show_more::{ShowMore, DEFAULT_PAGE_SIZE};

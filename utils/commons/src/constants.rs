/// Tag for the Custom Listing event.
pub const LISTING_TAG: u8 = u8::MAX - 8;

/// Tag for the Custom Biding event.
pub const BIDING_TAG: u8 = u8::MAX - 11;

/// Tag for the Custom Finalize Biding event.
pub const FINALIZE_TAG: u8 = u8::MAX - 12;

/// Tag for the Custom Withdraw event.
pub const WITHDRAW_TAG: u8 = u8::MAX - 23;

/// Shortest allowed auction, in days.
pub const MIN_DURATION_DAYS: u64 = 1;

/// Longest allowed auction, in days.
pub const MAX_DURATION_DAYS: u64 = 60;

/// Upper bound of auctions returned by a single page view.
pub const MAX_VIEW_PAGE: u32 = 30;

//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity cancellation.
#[derive(Clone, Copy, Debug)]
pub struct Cancellation;

/// Marker type describing a settlement of funds.
#[derive(Clone, Copy, Debug)]
pub struct Settlement;

/// Marker type describing a refund of funds.
#[derive(Clone, Copy, Debug)]
pub struct Refund;

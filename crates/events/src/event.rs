use chrono::{DateTime, Utc};

/// A fact the portal has committed.
///
/// `event_type` names follow `<component>.<aggregate>.<verb>`, for example
/// `catalog.product.deprecated` or `entitlements.subscription.created`.
/// `version` is the schema version of that type's payload.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the change, not the time it was published.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// `event_type@vN`, as written to logs.
    fn label(&self) -> String {
        format!("{}@v{}", self.event_type(), self.version())
    }
}

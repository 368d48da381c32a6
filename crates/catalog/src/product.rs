use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devportal_core::{
    AggregateRoot, CategoryId, DomainError, DomainResult, EndpointId, ProductId, ProductVersion,
    UserId,
};

use crate::category::normalize_tag;

/// Input for a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub status: bool,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub promote: bool,
    #[serde(default)]
    pub commercial: bool,
    #[serde(default)]
    pub weight: i32,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub comparison_id: Option<Uuid>,
}

fn default_true() -> bool {
    true
}

impl NewProduct {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            label: None,
            domain: None,
            enabled: true,
            visible: true,
            status: true,
            sticky: false,
            promote: false,
            commercial: false,
            weight: 0,
            categories: Vec::new(),
            tags: Vec::new(),
            comparison_id: None,
        }
    }
}

/// Content change to an existing product. `None` leaves a field untouched.
///
/// There is deliberately no `deprecated` field: deprecation only moves
/// forward through [`Product::deprecate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub sticky: Option<bool>,
    #[serde(default)]
    pub promote: Option<bool>,
    #[serde(default)]
    pub weight: Option<i32>,
    #[serde(default)]
    pub categories: Option<Vec<CategoryId>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub comparison_id: Option<Uuid>,
    /// Explicit new version; must be strictly greater than the current one.
    #[serde(default)]
    pub version: Option<ProductVersion>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &ProductPatch::default()
    }
}

/// Aggregate root: a published API product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub label: Option<String>,
    pub domain: Option<String>,
    pub version: ProductVersion,
    pub enabled: bool,
    pub deprecated: bool,
    pub visible: bool,
    pub status: bool,
    pub sticky: bool,
    pub promote: bool,
    pub commercial: bool,
    pub weight: i32,
    pub categories: Vec<CategoryId>,
    pub tags: BTreeSet<String>,
    pub endpoints: Vec<EndpointId>,
    pub comparison_id: Option<Uuid>,
    pub revision: u64,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub created_by: UserId,
    pub changed_by: UserId,
}

impl Product {
    /// Create a product at version `1.0.0`, not deprecated.
    ///
    /// Name uniqueness and category existence need the whole catalog and are
    /// checked by the store before calling this.
    pub fn create(
        id: ProductId,
        spec: NewProduct,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = Self::validate_name(&spec.name)?;

        Ok(Self {
            id,
            name,
            description: spec.description,
            label: spec.label,
            domain: spec.domain,
            version: ProductVersion::INITIAL,
            enabled: spec.enabled,
            deprecated: false,
            visible: spec.visible,
            status: spec.status,
            sticky: spec.sticky,
            promote: spec.promote,
            commercial: spec.commercial,
            weight: spec.weight,
            categories: dedup_ordered(spec.categories),
            tags: normalize_tags(spec.tags),
            endpoints: Vec::new(),
            comparison_id: spec.comparison_id,
            revision: 1,
            created: now,
            changed: now,
            created_by: actor,
            changed_by: actor,
        })
    }

    pub fn validate_name(name: &str) -> DomainResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(name.to_string())
    }

    /// Key used for name-uniqueness checks (case-insensitive).
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Whether new subscriptions may reference this product, and whether
    /// existing ones count as live entitlements.
    pub fn is_entitleable(&self) -> bool {
        self.enabled && !self.deprecated
    }

    /// Apply a content change and move the version forward.
    pub fn apply_patch(
        &mut self,
        patch: ProductPatch,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::validation("product patch is empty"));
        }

        let next_version = match patch.version {
            Some(v) if v <= self.version => {
                return Err(DomainError::validation(format!(
                    "version {v} must be greater than current version {}",
                    self.version
                )));
            }
            // Later bumps need a successor.
            Some(v) if v == ProductVersion::MAX => {
                return Err(DomainError::validation(format!(
                    "version {v} leaves no room for later changes"
                )));
            }
            Some(v) => v,
            None => self.version.bump_patch()?,
        };

        if let Some(name) = patch.name {
            self.name = Self::validate_name(&name)?;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(label) = patch.label {
            self.label = Some(label);
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(sticky) = patch.sticky {
            self.sticky = sticky;
        }
        if let Some(promote) = patch.promote {
            self.promote = promote;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(categories) = patch.categories {
            self.categories = dedup_ordered(categories);
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if patch.comparison_id.is_some() {
            self.comparison_id = patch.comparison_id;
        }

        self.version = next_version;
        self.mark_changed(actor, now);
        Ok(())
    }

    /// Enable or disable the product. Returns `false` if nothing changed.
    pub fn set_enabled(
        &mut self,
        enabled: bool,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        if self.enabled == enabled {
            return Ok(false);
        }
        self.bump(actor, now)?;
        self.enabled = enabled;
        Ok(true)
    }

    /// Mark the product deprecated. Returns `false` if it already was.
    ///
    /// Endpoints are not touched; each is deprecated on its own.
    pub fn deprecate(&mut self, actor: UserId, now: DateTime<Utc>) -> DomainResult<bool> {
        if self.deprecated {
            return Ok(false);
        }
        self.bump(actor, now)?;
        self.deprecated = true;
        Ok(true)
    }

    /// Record ownership of a newly added endpoint.
    pub fn attach_endpoint(
        &mut self,
        endpoint_id: EndpointId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.bump(actor, now)?;
        if !self.endpoints.contains(&endpoint_id) {
            self.endpoints.push(endpoint_id);
        }
        Ok(())
    }

    /// Record a change to one of the owned endpoints.
    pub fn endpoint_changed(&mut self, actor: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.bump(actor, now)
    }

    /// Runs before any other field changes, so a failure leaves `self` intact.
    fn bump(&mut self, actor: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.version = self.version.bump_patch()?;
        self.mark_changed(actor, now);
        Ok(())
    }

    fn mark_changed(&mut self, actor: UserId, now: DateTime<Utc>) {
        self.revision += 1;
        // Keep `changed` monotonic even if the caller's clock steps back.
        self.changed = now.max(self.changed);
        self.changed_by = actor;
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.revision
    }
}

fn normalize_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.iter().filter_map(|t| normalize_tag(t)).collect()
}

fn dedup_ordered(categories: Vec<CategoryId>) -> Vec<CategoryId> {
    let mut out = Vec::with_capacity(categories.len());
    for c in categories {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> UserId {
        UserId::new()
    }

    fn product(name: &str) -> Product {
        Product::create(ProductId::new(), NewProduct::named(name), actor(), Utc::now()).unwrap()
    }

    #[test]
    fn create_starts_at_initial_version() {
        let p = product("Payments API");
        assert_eq!(p.version, ProductVersion::INITIAL);
        assert!(!p.deprecated);
        assert!(p.enabled);
        assert_eq!(p.revision, 1);
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = Product::create(ProductId::new(), NewProduct::named("   "), actor(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_normalizes_tags_and_dedups_categories() {
        let c = CategoryId::new();
        let mut spec = NewProduct::named("Accounts");
        spec.tags = vec!["Open Banking".into(), "open banking".into(), " ".into()];
        spec.categories = vec![c, c];
        let p = Product::create(ProductId::new(), spec, actor(), Utc::now()).unwrap();
        assert_eq!(p.tags.len(), 1);
        assert!(p.tags.contains("open banking"));
        assert_eq!(p.categories, vec![c]);
    }

    #[test]
    fn deprecate_is_idempotent_and_bumps_once() {
        let mut p = product("Cards");
        assert!(p.deprecate(actor(), Utc::now()).unwrap());
        let after_first = p.version;
        assert!(after_first > ProductVersion::INITIAL);

        assert!(!p.deprecate(actor(), Utc::now()).unwrap());
        assert_eq!(p.version, after_first);
        assert!(p.deprecated);
    }

    #[test]
    fn deprecated_or_disabled_products_are_not_entitleable() {
        let mut p = product("Loans");
        assert!(p.is_entitleable());
        p.set_enabled(false, actor(), Utc::now()).unwrap();
        assert!(!p.is_entitleable());
        p.set_enabled(true, actor(), Utc::now()).unwrap();
        p.deprecate(actor(), Utc::now()).unwrap();
        assert!(!p.is_entitleable());
    }

    #[test]
    fn patch_bumps_version_by_default() {
        let mut p = product("FX");
        let patch = ProductPatch {
            description: Some("Foreign exchange rates".into()),
            ..ProductPatch::default()
        };
        p.apply_patch(patch, actor(), Utc::now()).unwrap();
        assert_eq!(p.version, ProductVersion::new(1, 0, 1));
    }

    #[test]
    fn patch_rejects_non_increasing_explicit_version() {
        let mut p = product("FX");
        let patch = ProductPatch {
            label: Some("beta".into()),
            version: Some(ProductVersion::INITIAL),
            ..ProductPatch::default()
        };
        let err = p.apply_patch(patch, actor(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(p.label, None);
    }

    #[test]
    fn patch_accepts_greater_explicit_version() {
        let mut p = product("FX");
        let patch = ProductPatch {
            label: Some("ga".into()),
            version: Some(ProductVersion::new(2, 0, 0)),
            ..ProductPatch::default()
        };
        p.apply_patch(patch, actor(), Utc::now()).unwrap();
        assert_eq!(p.version, ProductVersion::new(2, 0, 0));
    }

    #[test]
    fn patch_cannot_clear_deprecation() {
        let mut p = product("Legacy");
        p.deprecate(actor(), Utc::now()).unwrap();
        let patch = ProductPatch {
            name: Some("Legacy v2".into()),
            ..ProductPatch::default()
        };
        p.apply_patch(patch, actor(), Utc::now()).unwrap();
        assert!(p.deprecated);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let mut p = product("Empty");
        assert!(p.apply_patch(ProductPatch::default(), actor(), Utc::now()).is_err());
        assert_eq!(p.revision, 1);
    }

    #[test]
    fn set_enabled_same_value_is_noop() {
        let mut p = product("Noop");
        assert!(!p.set_enabled(true, actor(), Utc::now()).unwrap());
        assert_eq!(p.version, ProductVersion::INITIAL);
    }

    #[test]
    fn version_keeps_increasing_past_the_top_patch_number() {
        let mut p = product("Edge");
        let patch = ProductPatch {
            label: Some("edge".into()),
            version: Some(ProductVersion::new(1, 0, u32::MAX)),
            ..ProductPatch::default()
        };
        p.apply_patch(patch, actor(), Utc::now()).unwrap();

        assert!(p.deprecate(actor(), Utc::now()).unwrap());
        assert_eq!(p.version, ProductVersion::new(1, 1, 0));
    }

    #[test]
    fn patch_rejects_version_without_successor() {
        let mut p = product("Edge");
        let patch = ProductPatch {
            label: Some("edge".into()),
            version: Some(ProductVersion::MAX),
            ..ProductPatch::default()
        };
        let err = p.apply_patch(patch, actor(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(p.version, ProductVersion::INITIAL);
    }

    #[test]
    fn failed_bump_leaves_product_untouched() {
        let mut p = product("Exhausted");
        p.version = ProductVersion::MAX;
        assert!(matches!(
            p.deprecate(actor(), Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert!(!p.deprecated);
        assert_eq!(p.revision, 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Deprecate,
            Enable(bool),
            Rename(String),
            Weight(i32),
            Attach,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Deprecate),
                any::<bool>().prop_map(Op::Enable),
                "[A-Za-z][A-Za-z0-9 ]{0,20}".prop_map(Op::Rename),
                any::<i32>().prop_map(Op::Weight),
                Just(Op::Attach),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: once deprecated, no operation sequence clears the flag.
            #[test]
            fn deprecation_is_monotonic(ops in proptest::collection::vec(op(), 1..40)) {
                let mut p = product("Prop");
                let mut seen_deprecated = false;
                for op in ops {
                    let now = Utc::now();
                    match op {
                        Op::Deprecate => { p.deprecate(actor(), now).unwrap(); }
                        Op::Enable(v) => { p.set_enabled(v, actor(), now).unwrap(); }
                        Op::Rename(n) => {
                            let _ = p.apply_patch(ProductPatch { name: Some(n), ..ProductPatch::default() }, actor(), now);
                        }
                        Op::Weight(w) => {
                            let _ = p.apply_patch(ProductPatch { weight: Some(w), ..ProductPatch::default() }, actor(), now);
                        }
                        Op::Attach => p.attach_endpoint(EndpointId::new(), actor(), now).unwrap(),
                    }
                    seen_deprecated |= p.deprecated;
                    prop_assert_eq!(p.deprecated, seen_deprecated);
                }
            }

            /// Property: every successful mutation strictly increases the version.
            #[test]
            fn version_increases_on_every_mutation(ops in proptest::collection::vec(op(), 1..40)) {
                let mut p = product("Prop");
                for op in ops {
                    let before = (p.version, p.revision);
                    let now = Utc::now();
                    let changed = match op {
                        Op::Deprecate => p.deprecate(actor(), now).unwrap(),
                        Op::Enable(v) => p.set_enabled(v, actor(), now).unwrap(),
                        Op::Rename(n) => p.apply_patch(ProductPatch { name: Some(n), ..ProductPatch::default() }, actor(), now).is_ok(),
                        Op::Weight(w) => p.apply_patch(ProductPatch { weight: Some(w), ..ProductPatch::default() }, actor(), now).is_ok(),
                        Op::Attach => { p.attach_endpoint(EndpointId::new(), actor(), now).unwrap(); true }
                    };
                    if changed {
                        prop_assert!(p.version > before.0);
                        prop_assert!(p.revision > before.1);
                    } else {
                        prop_assert_eq!((p.version, p.revision), before);
                    }
                }
            }
        }
    }
}

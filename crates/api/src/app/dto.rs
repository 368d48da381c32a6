use serde::Deserialize;

use devportal_applications::ApplicationStatus;
use devportal_core::{ApplicationId, EnvironmentId, PageRequest, ProductId, SortOrder};
use devportal_infra::SubscriptionFilter;

// -------------------------
// Query parameters
// -------------------------

/// `?offset=&limit=&sort=&order=`; a missing limit takes the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl PageQuery {
    pub fn to_request(&self, default_limit: u32) -> PageRequest {
        PageRequest {
            offset: self.offset.unwrap_or(0),
            limit: self.limit.unwrap_or(default_limit),
            sort_field: self.sort.clone(),
            sort_order: self.order.unwrap_or_default(),
        }
    }
}

/// Subscription listing: the paging parameters plus optional filters.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub application_id: Option<ApplicationId>,
    pub product_id: Option<ProductId>,
    pub environment_id: Option<EnvironmentId>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl SubscriptionQuery {
    pub fn filter(&self) -> SubscriptionFilter {
        SubscriptionFilter {
            application_id: self.application_id,
            product_id: self.product_id,
            environment_id: self.environment_id,
        }
    }

    pub fn to_request(&self, default_limit: u32) -> PageRequest {
        PageQuery {
            offset: self.offset,
            limit: self.limit,
            sort: self.sort.clone(),
            order: self.order,
        }
        .to_request(default_limit)
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ScopeRequest {
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub application_id: ApplicationId,
    pub product_id: ProductId,
    pub environment_id: EnvironmentId,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCredentialRequest {
    pub client_id: String,
    pub client_secret: String,
}

//! HTTP request handlers.
//!
//! Handlers stay thin: resolve the caller, open a pooled connection, call one
//! service, hand any pending deliveries to the dispatcher after the service's
//! transaction has committed, and wrap the result in [`ApiResponse`].

pub mod attachments;
pub mod auth;
pub mod comments;
pub mod health;
pub mod invitations;
pub mod members;
pub mod notifications;
pub mod projects;
pub mod requests;
pub mod tasks;

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::pagination::PaginationMeta;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PagedResponse<T> {
    #[schema(example = true)]
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

pub fn respond<T>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data,
    })
}

pub fn respond_paged<T>(
    message: impl Into<String>,
    data: Vec<T>,
    pagination: PaginationMeta,
) -> Json<PagedResponse<T>> {
    Json(PagedResponse {
        success: true,
        message: message.into(),
        data,
        pagination,
    })
}

//! OpenAPI documentation served through Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ProjectHub API",
        version = "1.0.0",
        description = "Project collaboration backend.\n\n\
        ## Features\n\
        - Projects with Admin, Editor and Member roles\n\
        - Invitations, join requests by project code, and direct adds\n\
        - Tasks with assignees, comments, attachments and a per-field history\n\
        - Persistent notifications with live push over `/notifhub`\n\n\
        ## Authentication\n\
        1. Register or login to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`\n\
        3. Connect to `/notifhub?access_token=<token>` for live pushes",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Registration, login and the current user"),
        (name = "Projects", description = "Projects, recent list and project history"),
        (name = "Members", description = "Project membership"),
        (name = "Invitations", description = "Invitations sent by project admins"),
        (name = "Requests", description = "Join requests by project code"),
        (name = "Tasks", description = "Tasks, assignees and task history"),
        (name = "Comments", description = "Task comments and their attachments"),
        (name = "Attachments", description = "Files attached to tasks"),
        (name = "Notifications", description = "The caller's notification inbox")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::get_current_user,

        crate::handlers::projects::create_project,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::open_project,
        crate::handlers::projects::recent_projects,
        crate::handlers::projects::project_by_code,
        crate::handlers::projects::project_history,

        crate::handlers::members::list_members,
        crate::handlers::members::add_member,
        crate::handlers::members::update_member,
        crate::handlers::members::remove_member,
        crate::handlers::members::leave_project,

        crate::handlers::invitations::invite,
        crate::handlers::invitations::pending_invitations,
        crate::handlers::invitations::accept_invitation,

        crate::handlers::requests::request_join,
        crate::handlers::requests::list_requests,
        crate::handlers::requests::resolve_request,

        crate::handlers::tasks::create_task,
        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::update_task,
        crate::handlers::tasks::delete_task,
        crate::handlers::tasks::update_assignees,
        crate::handlers::tasks::task_history,

        crate::handlers::comments::add_comment,
        crate::handlers::comments::list_comments,
        crate::handlers::comments::download_comment_attachment,

        crate::handlers::attachments::upload_attachment,
        crate::handlers::attachments::list_attachments,
        crate::handlers::attachments::download_attachment,
        crate::handlers::attachments::delete_attachment,

        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_all_read,
    ),
    components(
        schemas(
            ApiError,
            PaginationMeta,
            crate::models::MemberRole,
            crate::models::MemberStatus,
            crate::models::ProjectStatus,
            crate::models::TaskStatus,
            crate::models::TaskPriority,
            crate::models::InvitationStatus,
            crate::models::RequestStatus,
            crate::models::NotificationType,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token obtained from /auth/login or /auth/register.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "ProjectHub API");
        assert_eq!(doc.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_documents_collaboration_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/projects/{project_id}/members",
            "/tasks/{task_id}/assignees",
            "/requests/{request_id}",
            "/notifications/read-all",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

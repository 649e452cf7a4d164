pub mod account;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod sockets;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            auth::router()
                .merge(account::router())
                .merge(notifications::router())
                .merge(sockets::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Auth
        auth::register,
        auth::login,
        auth::rotate_token,
        auth::logout,
        auth::logout_all,
        // Account
        account::get_account,
        account::change_password,
        // Notifications
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::create_notification,
        // Sockets
        sockets::user_online,
        sockets::send_message,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::UserResponse,
            crate::models::notification::Notification,
            // Route request/response types
            health::HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::SessionResponse,
            auth::TokenResponse,
            auth::LogoutAllResponse,
            account::ChangePasswordRequest,
            notifications::ListNotificationsResponse,
            notifications::MarkAllReadResponse,
            notifications::CreateNotificationRequest,
            notifications::CreateNotificationResponse,
            sockets::OnlineResponse,
            sockets::SocketMessageRequest,
            sockets::SocketMessageResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Registration, login and token lifecycle"),
        (name = "Account", description = "The signed-in user's account"),
        (name = "Notifications", description = "Stored notifications with live delivery"),
        (name = "Sockets", description = "Live socket registry (admin)"),
    )
)]
pub struct ApiDoc;

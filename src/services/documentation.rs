use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Poll Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::poll::create_poll,
        crate::routes::poll::current_poll,
        crate::routes::poll::poll_history,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::poll::CreatePollRequest,
            crate::dto::poll::PollSummary,
            crate::dto::poll::PollOptionSummary,
            crate::dto::poll::CurrentPollResponse,
            crate::dto::ws::ClientMessage,
            crate::state::session::ChatRole,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "poll", description = "Poll lifecycle and history"),
        (name = "session", description = "WebSocket operations for live sessions"),
    )
)]
pub struct ApiDoc;

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pizza Pantry API",
        version = "1.0.0",
        description = r#"
# Pizza Pantry

Inventory tracking for pizza kitchens: ingredients and supplies, quantity
adjustments with reasons, and a full audit trail of every change.

## Authentication

Every `/api/v1` endpoint requires a bearer token issued by the identity provider:

```
Authorization: Bearer <your-jwt-token>
```

## Errors

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient quantity",
  "details": "current quantity 5, requested change -6",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Idempotency

`PATCH /api/v1/items/{id}/quantity` accepts an `Idempotency-Key` header. A
repeated key returns the original result instead of applying the change again.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "items", description = "Inventory items and quantity adjustments"),
        (name = "audit", description = "Quantity change history"),
        (name = "inventory", description = "Summary figures and catalog"),
        (name = "webhooks", description = "Identity provider events"),
        (name = "health", description = "Probes")
    ),
    paths(
        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
        crate::handlers::items::list_items,
        crate::handlers::items::create_item,
        crate::handlers::items::get_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::items::adjust_quantity,
        crate::handlers::audit::list_audit,
        crate::handlers::inventory::inventory_summary,
        crate::handlers::inventory::catalog,
        crate::handlers::webhooks::clerk_webhook_status,
        crate::handlers::webhooks::clerk_webhook,
    ),
    components(
        schemas(
            crate::entities::inventory_item::Model,
            crate::entities::quantity_audit_log::Model,
            crate::models::inventory::ItemView,
            crate::models::inventory::InventorySummary,
            crate::models::inventory::StockStatus,
            crate::models::inventory::SortKey,
            crate::models::catalog::Catalog,
            crate::models::catalog::Category,
            crate::models::catalog::Unit,
            crate::models::input::CreateItemInput,
            crate::models::input::UpdateItemInput,
            crate::models::input::AdjustQuantityInput,
            crate::services::audit::AuditPage,
            crate::handlers::common::SuccessResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}
